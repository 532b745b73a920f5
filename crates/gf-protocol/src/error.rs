//! Protocol error types

use thiserror::Error;

/// Errors raised before any network activity when a command object is
/// malformed
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Command has no declared name
    #[error("Command has no declared name")]
    MissingCommandName,

    /// Command payload could not be serialized or deserialized
    #[error("Malformed command payload: {0}")]
    Payload(#[from] serde_json::Error),
}
