//! Cache synchronization records
//!
//! A `SyncStatus` row records the cache state of one data item on one node.
//! Rows are owned by their node and are cascade-deleted with it; the
//! registry performs that cascade transactionally.

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// Cache synchronization state of a data item on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Item is being copied to the node's cache
    ToCache,
    /// Cached copy matches the provider copy
    Synced,
    /// Cached copy is older than the provider copy
    Stale,
    /// Cached copy has local modifications not yet pushed back
    Modified,
}

/// One node/item synchronization record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Owning node
    pub node_id: NodeId,
    /// Data item identifier
    pub item_id: String,
    /// Current synchronization state
    pub state: SyncState,
    /// Last state change, Unix millis
    pub updated_at: u64,
}

impl SyncStatus {
    /// Create a record marked synced as of now
    pub fn synced(node_id: NodeId, item_id: impl Into<String>) -> Self {
        Self {
            node_id,
            item_id: item_id.into(),
            state: SyncState::Synced,
            updated_at: crate::time::current_time_millis(),
        }
    }
}
