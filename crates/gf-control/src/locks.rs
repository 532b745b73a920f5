//! Per-node operation locks
//!
//! Liveness checks, tunnel transitions, and other control operations on the
//! *same* node must not interleave; operations on different nodes are
//! independent. `NodeLocks` hands out one async mutex per node id.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use gf_core::types::NodeId;

/// One mutex per node id, created on first use
#[derive(Default)]
pub struct NodeLocks {
    locks: DashMap<NodeId, Arc<Mutex<()>>>,
}

impl NodeLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one node, waiting if another control operation
    /// on the same node is in flight
    pub async fn acquire(&self, id: &NodeId) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_same_node_operations_serialize() {
        let locks = Arc::new(NodeLocks::new());
        let id = NodeId::new("exec-01");
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let id = id.clone();
            let in_flight = Arc::clone(&in_flight);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&id).await;
                let active = in_flight.fetch_add(1, Ordering::SeqCst);
                assert_eq!(active, 0, "two operations on the same node overlapped");
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_different_nodes_do_not_block_each_other() {
        let locks = NodeLocks::new();
        let guard_a = locks.acquire(&NodeId::new("a")).await;
        // Must not deadlock while "a" is held.
        let guard_b = locks.acquire(&NodeId::new("b")).await;
        drop(guard_a);
        drop(guard_b);
    }
}
