//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node in the fleet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new node ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        let id = NodeId::new("exec-east-01");
        assert_eq!(format!("{}", id), "exec-east-01");
        assert_eq!(id.as_str(), "exec-east-01");
    }

    #[test]
    fn test_node_id_from_str() {
        let id: NodeId = "storage-03".into();
        assert_eq!(id, NodeId::new("storage-03"));
    }
}
