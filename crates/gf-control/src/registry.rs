//! Node registry
//!
//! Persistence boundary for node records and their sync-status rows. The
//! control plane only needs load/save/delete plus token lookup; the
//! in-memory implementation here backs tests and single-process
//! deployments, and a database-backed registry can slot in behind the same
//! trait.
//!
//! Deleting a node cascades to its sync-status rows, and the cascade is
//! transactional: no orphaned rows survive, and readers never observe the
//! node gone while its rows remain.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use gf_core::sync::SyncStatus;
use gf_core::token::tokens_match;
use gf_core::types::NodeId;
use gf_core::Node;

use crate::error::FleetError;

/// Persistence operations the control plane needs from a node store
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// Id of the node this process runs as
    fn self_id(&self) -> &NodeId;

    /// Load one node by id
    async fn load(&self, id: &NodeId) -> Result<Node, FleetError>;

    /// Validate and persist a node
    async fn save(&self, node: &Node) -> Result<(), FleetError>;

    /// Delete a node and cascade-delete its sync-status rows
    async fn delete(&self, id: &NodeId) -> Result<(), FleetError>;

    /// Find the node owning the given command-channel token
    async fn find_by_token(&self, token: &str) -> Option<NodeId>;

    /// All registered node ids
    async fn all_ids(&self) -> Vec<NodeId>;

    /// Record a sync-status row for a node
    async fn add_sync_status(&self, status: SyncStatus) -> Result<(), FleetError>;

    /// Remove sync-status rows for the given items within the given
    /// updated-at cutoffs (Unix millis). Empty `item_ids` matches every
    /// item. Returns the number of rows removed.
    async fn remove_sync_statuses(
        &self,
        id: &NodeId,
        item_ids: &[String],
        older_than_millis: Option<u64>,
        younger_than_millis: Option<u64>,
    ) -> Result<usize, FleetError>;

    /// Number of sync-status rows owned by a node
    async fn sync_status_count(&self, id: &NodeId) -> usize;
}

/// In-memory registry
pub struct MemoryRegistry {
    self_id: NodeId,
    nodes: DashMap<NodeId, Node>,
    statuses: DashMap<NodeId, Vec<SyncStatus>>,
    // Serializes delete-with-cascade against other mutations
    mutation: Mutex<()>,
}

impl MemoryRegistry {
    /// Create an empty registry identifying itself as `self_id`
    pub fn new(self_id: NodeId) -> Self {
        Self {
            self_id,
            nodes: DashMap::new(),
            statuses: DashMap::new(),
            mutation: Mutex::new(()),
        }
    }

    /// Create a registry pre-populated with the given nodes
    pub fn with_nodes(self_id: NodeId, nodes: impl IntoIterator<Item = Node>) -> Arc<Self> {
        let registry = Self::new(self_id);
        for node in nodes {
            registry.nodes.insert(node.id.clone(), node);
        }
        Arc::new(registry)
    }
}

#[async_trait]
impl NodeRegistry for MemoryRegistry {
    fn self_id(&self) -> &NodeId {
        &self.self_id
    }

    async fn load(&self, id: &NodeId) -> Result<Node, FleetError> {
        self.nodes
            .get(id)
            .map(|n| n.clone())
            .ok_or_else(|| FleetError::NodeNotFound(id.clone()))
    }

    async fn save(&self, node: &Node) -> Result<(), FleetError> {
        node.validate()?;
        self.nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }

    async fn delete(&self, id: &NodeId) -> Result<(), FleetError> {
        let _guard = self.mutation.lock().await;
        if self.nodes.remove(id).is_none() {
            return Err(FleetError::NodeNotFound(id.clone()));
        }
        let removed = self.statuses.remove(id).map(|(_, v)| v.len()).unwrap_or(0);
        tracing::debug!(node = %id, rows = removed, "deleted node with cascade");
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Option<NodeId> {
        if token.is_empty() {
            return None;
        }
        self.nodes
            .iter()
            .find(|entry| tokens_match(token, entry.value().auth_token()))
            .map(|entry| entry.key().clone())
    }

    async fn all_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|entry| entry.key().clone()).collect()
    }

    async fn add_sync_status(&self, status: SyncStatus) -> Result<(), FleetError> {
        // Existence check and insert must be one atomic step, or a
        // concurrent delete could cascade between them and leave this row
        // orphaned.
        let _guard = self.mutation.lock().await;
        if !self.nodes.contains_key(&status.node_id) {
            return Err(FleetError::NodeNotFound(status.node_id.clone()));
        }
        self.statuses
            .entry(status.node_id.clone())
            .or_default()
            .push(status);
        Ok(())
    }

    async fn remove_sync_statuses(
        &self,
        id: &NodeId,
        item_ids: &[String],
        older_than_millis: Option<u64>,
        younger_than_millis: Option<u64>,
    ) -> Result<usize, FleetError> {
        let _guard = self.mutation.lock().await;
        let mut removed = 0;
        if let Some(mut rows) = self.statuses.get_mut(id) {
            let before = rows.len();
            rows.retain(|row| {
                let listed = item_ids.is_empty() || item_ids.contains(&row.item_id);
                let old_enough = older_than_millis.map_or(true, |cutoff| row.updated_at < cutoff);
                let young_enough =
                    younger_than_millis.map_or(true, |cutoff| row.updated_at > cutoff);
                !(listed && old_enough && young_enough)
            });
            removed = before - rows.len();
        }
        Ok(removed)
    }

    async fn sync_status_count(&self, id: &NodeId) -> usize {
        self.statuses.get(id).map(|rows| rows.len()).unwrap_or(0)
    }
}
