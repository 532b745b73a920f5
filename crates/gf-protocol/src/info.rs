//! Liveness snapshots
//!
//! A `LivenessSnapshot` is the transient payload returned by querying a
//! node's `/info` endpoint. It is never persisted; the `name` field is the
//! liveness signal, and any fetch failure degrades to the dummy snapshot.

use serde::{Deserialize, Serialize};

/// The `name` value of a snapshot from a node that did not answer
pub const UNKNOWN_NAME: &str = "???";

/// Transient status payload used to decide reachability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessSnapshot {
    /// The node's configured name; compared against the expected name
    pub name: String,
    /// Hostname the node is running on
    pub host: String,
    /// Software revision the node is running
    pub revision: String,
    /// Process id of the node's control process
    pub pid: u32,
    /// Process start time, Unix millis
    pub start_time: u64,
}

impl LivenessSnapshot {
    /// Snapshot standing in for a node that could not be reached.
    ///
    /// Its name never matches a real node name, so a dummy snapshot always
    /// reads as "not alive".
    pub fn dummy() -> Self {
        Self {
            name: UNKNOWN_NAME.to_string(),
            host: UNKNOWN_NAME.to_string(),
            revision: UNKNOWN_NAME.to_string(),
            pid: 0,
            start_time: 0,
        }
    }

    /// Collect a snapshot of the local process
    pub fn local(name: impl Into<String>, start_time: u64) -> Self {
        let host = gethostname::gethostname().to_string_lossy().into_owned();
        Self {
            name: name.into(),
            host,
            revision: env!("CARGO_PKG_VERSION").to_string(),
            pid: std::process::id(),
            start_time,
        }
    }

    /// True for the unreachable sentinel
    pub fn is_dummy(&self) -> bool {
        self.name == UNKNOWN_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_never_matches_a_name() {
        let dummy = LivenessSnapshot::dummy();
        assert!(dummy.is_dummy());
        assert_eq!(dummy.name, "???");
        assert_eq!(dummy.pid, 0);
    }

    #[test]
    fn test_local_snapshot() {
        let snapshot = LivenessSnapshot::local("portal-main", 12345);
        assert_eq!(snapshot.name, "portal-main");
        assert_eq!(snapshot.pid, std::process::id());
        assert_eq!(snapshot.start_time, 12345);
        assert!(!snapshot.is_dummy());
        assert!(!snapshot.host.is_empty());
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let snapshot = LivenessSnapshot::local("exec-01", 99);
        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: LivenessSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
