//! Error taxonomy for the GridFleet control plane
//!
//! Each enum covers one failure class; the control-plane crate wraps them
//! in its umbrella `FleetError`. Authentication failures are never raised
//! across the wire: the dispatcher converts them into error responses sent
//! back to the originator, so `AuthError` only appears in local reporting.

use crate::types::NodeId;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed data rejected before any state is committed
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Cache directory must be an absolute path (or unset)
    #[error("Cache directory is not an absolute path: {0}")]
    RelativeCachePath(PathBuf),

    /// Ignore pattern contains forbidden characters or tokens
    #[error("Invalid ignore pattern: {0:?}")]
    InvalidIgnorePattern(String),

    /// An "older than"/"younger than" bound was neither a timestamp nor a duration
    #[error("Time bound is neither a timestamp nor a duration: {0}")]
    InvalidTimeBound(String),
}

/// Token mismatch on the command channel
#[derive(Error, Debug)]
pub enum AuthError {
    /// Receiver token does not match this node's own token
    #[error("Receiver token does not match this node")]
    BadReceiverToken,

    /// Sender token does not belong to any registered node
    #[error("Sender token does not match any registered node")]
    UnknownSenderToken,
}

/// Network or SSH failure; recoverable, never fatal to the caller
#[derive(Error, Debug)]
pub enum TransportError {
    /// Node did not answer within the configured timeout
    #[error("Node unreachable: {0}")]
    Unreachable(String),

    /// SSH control session failed to start or died
    #[error("SSH session failure: {0}")]
    Session(String),

    /// The remote side answered with an error message
    #[error("Remote error: {0}")]
    Remote(String),
}

/// Operation attempted without its prerequisites; never attempted remotely
#[derive(Error, Debug)]
pub enum PreconditionError {
    /// Node has no SSH control host/user configured
    #[error("Node {0} has no SSH control info")]
    MissingSshControlInfo(NodeId),

    /// SSH control session is not alive
    #[error("SSH control session for node {0} is not alive")]
    SessionNotAlive(NodeId),

    /// Operation is meaningless against the coordinator itself
    #[error("Operation not applicable to the coordinator node")]
    SelfNode,
}

/// Command could not be routed to a handler
#[derive(Error, Debug)]
pub enum RoutingError {
    /// No handler registered under the command's name
    #[error("No handler registered for command {0:?}")]
    NoHandler(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
