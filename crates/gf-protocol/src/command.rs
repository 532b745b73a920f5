//! Remote commands
//!
//! A `RemoteCommand` is an immutable named instruction plus an argument map
//! and the sender/receiver token envelope. Commands are built through the
//! named constructors, which validate arguments before anything touches the
//! network; the dispatcher routes them by name on the receiving side.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use gf_core::error::ValidationError;

/// Well-known command names
pub mod commands {
    /// Purge items from the node's data cache
    pub const CLEAN_CACHE: &str = "clean_cache";
    /// Start the node's worker pool
    pub const START_WORKERS: &str = "start_workers";
    /// Stop the node's worker pool
    pub const STOP_WORKERS: &str = "stop_workers";
    /// Wake idle workers for an immediate pass
    pub const WAKEUP_WORKERS: &str = "wakeup_workers";
}

/// A time bound on a cache-cleanup command.
///
/// On the wire this is either a bare number (an age in seconds relative to
/// the receiver's clock) or an absolute Unix-millisecond timestamp object.
/// Anything else is rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeBound {
    /// Age in whole seconds relative to now
    AgeSecs(u64),
    /// Absolute point in time
    At {
        /// Unix timestamp in milliseconds
        timestamp_ms: u64,
    },
}

impl TimeBound {
    /// Bound expressed as an age
    pub fn age(duration: Duration) -> Self {
        Self::AgeSecs(duration.as_secs())
    }

    /// Bound expressed as an absolute Unix-millisecond timestamp
    pub fn at_millis(timestamp_ms: u64) -> Self {
        Self::At { timestamp_ms }
    }

    /// Parse a bound out of a raw JSON value.
    ///
    /// This is the validation gate for §cache-cleanup arguments: a value
    /// that is neither a timestamp nor a duration is a construction error.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value.clone())
            .map_err(|_| ValidationError::InvalidTimeBound(value.to_string()))
    }

    /// Resolve the bound to an absolute Unix-millisecond cutoff
    pub fn cutoff_millis(&self, now_millis: u64) -> u64 {
        match self {
            Self::AgeSecs(secs) => now_millis.saturating_sub(secs * 1000),
            Self::At { timestamp_ms } => *timestamp_ms,
        }
    }
}

/// A named, token-authenticated instruction sent between nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCommand {
    /// Declared command name; routing key on the receiving side
    pub command: String,

    /// Command arguments
    #[serde(default)]
    pub args: Map<String, Value>,

    /// Token of the sending node
    #[serde(default)]
    pub sender_token: String,

    /// Token the sender believes belongs to the receiver
    #[serde(default)]
    pub receiver_token: String,
}

/// Parsed arguments of a `clean_cache` command
#[derive(Debug, Clone, PartialEq)]
pub struct CleanCacheArgs {
    /// Identifiers of the items to purge
    pub item_ids: Vec<String>,
    /// Only purge items older than this bound
    pub older_than: Option<TimeBound>,
    /// Only purge items younger than this bound
    pub younger_than: Option<TimeBound>,
}

impl RemoteCommand {
    /// Create a command with the given name and no arguments.
    ///
    /// Tokens are stamped later by the command channel.
    pub fn named(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Map::new(),
            sender_token: String::new(),
            receiver_token: String::new(),
        }
    }

    /// Build a `clean_cache` command.
    ///
    /// The bounds are raw JSON values as they would arrive from a caller;
    /// each must parse as a [`TimeBound`] or construction fails.
    pub fn clean_cache(
        item_ids: &[String],
        older_than: Option<Value>,
        younger_than: Option<Value>,
    ) -> Result<Self, ValidationError> {
        let mut args = Map::new();
        args.insert(
            "item_ids".to_string(),
            Value::Array(item_ids.iter().cloned().map(Value::String).collect()),
        );

        if let Some(value) = older_than {
            TimeBound::from_value(&value)?;
            args.insert("older_than".to_string(), value);
        }
        if let Some(value) = younger_than {
            TimeBound::from_value(&value)?;
            args.insert("younger_than".to_string(), value);
        }

        Ok(Self {
            command: commands::CLEAN_CACHE.to_string(),
            args,
            sender_token: String::new(),
            receiver_token: String::new(),
        })
    }

    /// Build a `start_workers` command
    pub fn start_workers() -> Self {
        Self::named(commands::START_WORKERS)
    }

    /// Build a `stop_workers` command
    pub fn stop_workers() -> Self {
        Self::named(commands::STOP_WORKERS)
    }

    /// Build a `wakeup_workers` command
    pub fn wakeup_workers() -> Self {
        Self::named(commands::WAKEUP_WORKERS)
    }

    /// True when the command carries a non-blank name
    pub fn has_name(&self) -> bool {
        !self.command.trim().is_empty()
    }

    /// Stamp the token envelope
    pub fn with_tokens(
        mut self,
        sender_token: impl Into<String>,
        receiver_token: impl Into<String>,
    ) -> Self {
        self.sender_token = sender_token.into();
        self.receiver_token = receiver_token.into();
        self
    }

    /// Parse the argument map of a `clean_cache` command.
    ///
    /// Handlers re-validate on the receiving side; a command that crossed
    /// the wire with malformed bounds is rejected here.
    pub fn clean_cache_args(&self) -> Result<CleanCacheArgs, ValidationError> {
        let item_ids = match self.args.get("item_ids") {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        };

        let older_than = self
            .args
            .get("older_than")
            .map(TimeBound::from_value)
            .transpose()?;
        let younger_than = self
            .args
            .get("younger_than")
            .map(TimeBound::from_value)
            .transpose()?;

        Ok(CleanCacheArgs {
            item_ids,
            older_than,
            younger_than,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_cache_accepts_age_and_timestamp_bounds() {
        let ids = vec!["item-1".to_string(), "item-2".to_string()];
        let command = RemoteCommand::clean_cache(
            &ids,
            Some(json!(3600)),
            Some(json!({"timestamp_ms": 1_700_000_000_000u64})),
        )
        .expect("valid bounds");

        assert_eq!(command.command, commands::CLEAN_CACHE);
        let args = command.clean_cache_args().expect("parseable args");
        assert_eq!(args.item_ids, ids);
        assert_eq!(args.older_than, Some(TimeBound::AgeSecs(3600)));
        assert_eq!(
            args.younger_than,
            Some(TimeBound::at_millis(1_700_000_000_000))
        );
    }

    #[test]
    fn test_clean_cache_rejects_non_time_bound() {
        let ids = vec!["item-1".to_string()];
        let err = RemoteCommand::clean_cache(&ids, Some(json!("yesterday")), None);
        assert!(matches!(err, Err(ValidationError::InvalidTimeBound(_))));

        let err = RemoteCommand::clean_cache(&ids, None, Some(json!(true)));
        assert!(matches!(err, Err(ValidationError::InvalidTimeBound(_))));
    }

    #[test]
    fn test_worker_commands_have_expected_names() {
        assert_eq!(RemoteCommand::start_workers().command, "start_workers");
        assert_eq!(RemoteCommand::stop_workers().command, "stop_workers");
        assert_eq!(RemoteCommand::wakeup_workers().command, "wakeup_workers");
    }

    #[test]
    fn test_has_name() {
        assert!(RemoteCommand::start_workers().has_name());
        assert!(!RemoteCommand::named("").has_name());
        assert!(!RemoteCommand::named("   ").has_name());
    }

    #[test]
    fn test_token_stamping() {
        let command = RemoteCommand::wakeup_workers().with_tokens("sender", "receiver");
        assert_eq!(command.sender_token, "sender");
        assert_eq!(command.receiver_token, "receiver");
    }

    #[test]
    fn test_wire_shape() {
        let command = RemoteCommand::clean_cache(&["a".to_string()], Some(json!(60)), None)
            .unwrap()
            .with_tokens("s-tok", "r-tok");

        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["command"], "clean_cache");
        assert_eq!(value["sender_token"], "s-tok");
        assert_eq!(value["receiver_token"], "r-tok");
        assert_eq!(value["args"]["older_than"], 60);

        let parsed: RemoteCommand = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.command, command.command);
    }

    #[test]
    fn test_cutoff_millis() {
        let now = 10_000_000;
        assert_eq!(TimeBound::AgeSecs(10).cutoff_millis(now), now - 10_000);
        assert_eq!(TimeBound::at_millis(42).cutoff_millis(now), 42);
    }
}
