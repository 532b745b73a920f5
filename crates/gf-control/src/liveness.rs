//! Liveness tracking
//!
//! `is_alive` computes a freshness verdict for a node from a fetched
//! snapshot and applies the death-grace-period state machine:
//!
//! - a node freshly unreachable gets `time_of_death` stamped but stays
//!   online for one grace interval, so transient failures don't flap it
//! - a node still unreachable within the recent window is forced offline
//! - a death record older than the stale window is treated as stale: the
//!   timer resets and the node is optimistically put back online pending
//!   the next check
//!
//! Fetch failures are indistinguishable from "node did not respond": both
//! yield the dummy snapshot, whose name matches nothing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use gf_core::error::TransportError;
use gf_core::time::{current_time_millis, elapsed_duration};
use gf_core::types::NodeId;
use gf_core::{FleetConfig, Node};
use gf_protocol::LivenessSnapshot;

use crate::error::FleetError;
use crate::locks::NodeLocks;
use crate::registry::NodeRegistry;

/// Fetches a liveness snapshot from a remote node
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Query the node's `/info` endpoint
    async fn fetch(&self, node: &Node) -> Result<LivenessSnapshot, TransportError>;
}

/// HTTP snapshot fetcher with a bounded per-request timeout
pub struct HttpSnapshotFetcher {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpSnapshotFetcher {
    /// Create a fetcher with the given request timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self, node: &Node) -> Result<LivenessSnapshot, TransportError> {
        let url = format!("{}/info", node.site());
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        response
            .json::<LivenessSnapshot>()
            .await
            .map_err(|e| TransportError::Remote(e.to_string()))
    }
}

/// Computes and persists liveness verdicts
pub struct LivenessTracker {
    registry: Arc<dyn NodeRegistry>,
    config: Arc<FleetConfig>,
    locks: Arc<NodeLocks>,
    fetcher: Arc<dyn SnapshotFetcher>,
    /// Local process start time, reported in self snapshots
    started_at: u64,
}

impl LivenessTracker {
    /// Create a tracker using the HTTP fetcher
    pub fn new(
        registry: Arc<dyn NodeRegistry>,
        config: Arc<FleetConfig>,
        locks: Arc<NodeLocks>,
    ) -> Self {
        let fetcher = Arc::new(HttpSnapshotFetcher::new(config.liveness_timeout));
        Self::with_fetcher(registry, config, locks, fetcher)
    }

    /// Create a tracker with a custom snapshot fetcher
    pub fn with_fetcher(
        registry: Arc<dyn NodeRegistry>,
        config: Arc<FleetConfig>,
        locks: Arc<NodeLocks>,
        fetcher: Arc<dyn SnapshotFetcher>,
    ) -> Self {
        Self {
            registry,
            config,
            locks,
            fetcher,
            started_at: current_time_millis(),
        }
    }

    /// Is the node reachable and functioning?
    ///
    /// Mutates `online` and `time_of_death` per the grace-period state
    /// machine and persists every transition. An administrator-set offline
    /// flag short-circuits: no network call is made.
    pub async fn is_alive(&self, id: &NodeId) -> Result<bool, FleetError> {
        let _guard = self.locks.acquire(id).await;
        let mut node = self.registry.load(id).await?;

        if !node.online {
            return Ok(false);
        }

        let snapshot = self.snapshot_for(&node).await;
        if snapshot.name == node.name {
            if node.time_of_death.take().is_some() {
                self.registry.save(&node).await?;
            }
            return Ok(true);
        }

        let now = current_time_millis();
        match node.time_of_death {
            None => {
                // Fresh death: stamp it, leave the node online for one
                // grace interval.
                node.time_of_death = Some(now);
                self.registry.save(&node).await?;
                tracing::warn!(node = %node.id, "node unreachable, death recorded");
            }
            Some(since) if elapsed_duration(since) <= self.config.recent_death_window => {
                node.online = false;
                self.registry.save(&node).await?;
                tracing::warn!(node = %node.id, "node still dead, taking offline");
            }
            Some(since) if elapsed_duration(since) >= self.config.stale_death_window => {
                // The death record itself has gone stale: restart the
                // clock and assume the node recovered in the meantime.
                node.time_of_death = Some(now);
                node.online = true;
                self.registry.save(&node).await?;
                tracing::info!(node = %node.id, "stale death record reset");
            }
            Some(_) => {}
        }
        Ok(false)
    }

    /// Snapshot of the node if it is alive, the dummy otherwise
    pub async fn info(&self, id: &NodeId) -> Result<LivenessSnapshot, FleetError> {
        let node = self.registry.load(id).await?;
        if node.id == *self.registry.self_id() {
            return Ok(LivenessSnapshot::local(&node.name, self.started_at));
        }
        if self.is_alive(id).await? {
            Ok(self
                .fetcher
                .fetch(&node)
                .await
                .unwrap_or_else(|_| LivenessSnapshot::dummy()))
        } else {
            Ok(LivenessSnapshot::dummy())
        }
    }

    /// Snapshot of the local process, served by the control endpoint
    pub async fn self_snapshot(&self) -> Result<LivenessSnapshot, FleetError> {
        let node = self.registry.load(self.registry.self_id()).await?;
        Ok(LivenessSnapshot::local(&node.name, self.started_at))
    }

    async fn snapshot_for(&self, node: &Node) -> LivenessSnapshot {
        if node.id == *self.registry.self_id() {
            return LivenessSnapshot::local(&node.name, self.started_at);
        }
        match self.fetcher.fetch(node).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(node = %node.id, "liveness fetch failed: {}", e);
                LivenessSnapshot::dummy()
            }
        }
    }
}
