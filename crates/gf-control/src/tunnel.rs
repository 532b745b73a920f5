//! Tunnel lifecycle
//!
//! The `TunnelManager` owns every SSH control session in the process, keyed
//! by node id with lock-guarded find-or-create, and reconciles each node's
//! forwarded tunnels against its current configuration: a successful start
//! always clears the session's tunnel set and rebuilds it, so repeated
//! calls converge instead of trusting prior state.

use dashmap::DashMap;
use std::sync::Arc;

use gf_core::types::NodeId;
use gf_core::Node;

use crate::error::FleetError;
use crate::locks::NodeLocks;
use crate::registry::NodeRegistry;
use crate::session::{ControlSession, SessionFactory, TunnelSpec};

/// Port the database service listens on, from the remote end's view
pub const DB_SERVICE_PORT: u16 = 3306;

/// Fallback control-service port when the node doesn't configure one
pub const CONTROL_SERVICE_PORT: u16 = 8090;

/// Owns the per-node SSH control sessions and their tunnels
pub struct TunnelManager {
    registry: Arc<dyn NodeRegistry>,
    locks: Arc<NodeLocks>,
    factory: Arc<dyn SessionFactory>,
    sessions: DashMap<NodeId, Arc<dyn ControlSession>>,
}

impl TunnelManager {
    /// Create a manager with no sessions yet
    pub fn new(
        registry: Arc<dyn NodeRegistry>,
        locks: Arc<NodeLocks>,
        factory: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            registry,
            locks,
            factory,
            sessions: DashMap::new(),
        }
    }

    /// Find or create the control session for a node.
    ///
    /// The map entry is held while creating, so concurrent first access
    /// cannot produce duplicate sessions.
    pub fn session_for(&self, node: &Node) -> Arc<dyn ControlSession> {
        self.sessions
            .entry(node.id.clone())
            .or_insert_with(|| self.factory.create(node))
            .clone()
    }

    /// The existing session for a node, if any
    pub fn session(&self, id: &NodeId) -> Option<Arc<dyn ControlSession>> {
        self.sessions.get(id).map(|entry| entry.clone())
    }

    /// Bring up the node's SSH control session and its configured tunnels.
    ///
    /// Returns false without side effects on the coordinator's own node, on
    /// an offline node, on a node without SSH control info, or when the
    /// session cannot be started. Returns true when the session is already
    /// alive or after a successful start-and-rebuild.
    pub async fn start_tunnels(&self, id: &NodeId) -> Result<bool, FleetError> {
        let _guard = self.locks.acquire(id).await;
        let node = self.registry.load(id).await?;

        if node.id == *self.registry.self_id() {
            return Ok(false);
        }
        if !node.online {
            return Ok(false);
        }
        if !node.has_ssh_control_info() {
            return Ok(false);
        }

        let session = self.session_for(&node);
        if session.is_alive().await {
            return Ok(true);
        }

        if let Err(e) = session.start().await {
            tracing::warn!(node = %node.id, "control session start failed: {}", e);
            return Ok(false);
        }

        // Rebuild from current configuration rather than trusting prior state.
        session.clear_tunnels().await;

        if node.has_db_tunneling_info() {
            if let Err(e) = session.add_tunnel(db_tunnel(&node)).await {
                tracing::warn!(node = %node.id, "database tunnel failed: {}", e);
                return Ok(false);
            }
        }
        if node.has_control_tunneling_info() {
            if let Err(e) = session.add_tunnel(control_tunnel(&node)).await {
                tracing::warn!(node = %node.id, "control tunnel failed: {}", e);
                return Ok(false);
            }
        }

        tracing::info!(node = %node.id, "tunnels started");
        Ok(true)
    }

    /// Destroy the node's SSH control session, tearing down its tunnels.
    ///
    /// Returns false on the coordinator's own node or when the node has no
    /// SSH control info; safe to call when nothing is running.
    pub async fn stop_tunnels(&self, id: &NodeId) -> Result<bool, FleetError> {
        let _guard = self.locks.acquire(id).await;
        let node = self.registry.load(id).await?;

        if node.id == *self.registry.self_id() {
            return Ok(false);
        }
        if !node.has_ssh_control_info() {
            return Ok(false);
        }

        // Only an existing session needs tearing down; stopping a node
        // that was never started must not create one.
        if let Some(session) = self.session(id) {
            session.destroy().await;
            self.sessions.remove(id);
            tracing::info!(node = %node.id, "tunnels stopped");
        }
        Ok(true)
    }
}

fn db_tunnel(node: &Node) -> TunnelSpec {
    TunnelSpec {
        local_port: node.tunnel_db_port.unwrap_or_default(),
        remote_host: "127.0.0.1".to_string(),
        remote_port: DB_SERVICE_PORT,
    }
}

fn control_tunnel(node: &Node) -> TunnelSpec {
    TunnelSpec {
        local_port: node.tunnel_control_port.unwrap_or_default(),
        remote_host: "127.0.0.1".to_string(),
        remote_port: node.control_port.unwrap_or(CONTROL_SERVICE_PORT),
    }
}
