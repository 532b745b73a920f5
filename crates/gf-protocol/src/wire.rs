//! HTTP wire envelopes
//!
//! A command request body is the [`RemoteCommand`] itself; the response is
//! either the (possibly mutated) command echoed back or an error message.
//! Authentication failures travel as error responses, never as transport
//! faults.

use serde::{Deserialize, Serialize};

use crate::command::RemoteCommand;

/// Response to a `/command` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Echoed command on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<RemoteCommand>,

    /// Error message on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    /// Successful response echoing the processed command
    pub fn ok(command: RemoteCommand) -> Self {
        Self {
            command: Some(command),
            error: None,
        }
    }

    /// Error response carrying a message back to the sender
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            command: None,
            error: Some(message.into()),
        }
    }

    /// True when the response carries an error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
