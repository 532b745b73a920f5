//! Umbrella error for the control plane

use gf_core::error::{
    AuthError, ConfigError, PreconditionError, RoutingError, TransportError, ValidationError,
};
use gf_core::types::NodeId;
use gf_protocol::ProtocolError;
use thiserror::Error;

/// Top-level error type for control-plane operations
#[derive(Error, Debug)]
pub enum FleetError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Authentication error
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Precondition error
    #[error("Precondition error: {0}")]
    Precondition(#[from] PreconditionError),

    /// Routing error
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Unknown node
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
