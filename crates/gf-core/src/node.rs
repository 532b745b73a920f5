//! Node model
//!
//! A `Node` is one registered compute/storage resource in the grid: the
//! coordinator or a remote execution/storage node. The struct carries the
//! persisted configuration only; liveness, tunnel, and command behavior
//! live in the control-plane crate and mutate nodes through the registry.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ValidationError;
use crate::types::NodeId;

/// Characters allowed in a single path-ignore glob pattern
const IGNORE_PATTERN_CHARS: &str = "-.+=@%&:,~*?";

/// A registered compute/storage resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier
    pub id: NodeId,

    /// Display name; also the expected `name` field of a liveness snapshot
    pub name: String,

    /// Reachable-and-enabled flag. Cleared by administrators to force a
    /// node out of rotation, and by the liveness tracker once a death has
    /// outlived the grace window.
    pub online: bool,

    /// First moment (Unix millis) the node was seen unreachable; cleared
    /// on a successful liveness check. Owned by the liveness tracker.
    #[serde(default)]
    pub time_of_death: Option<u64>,

    /// Local cache directory; must be absolute when set
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Path-ignore glob patterns, ordered
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// SSH control host
    #[serde(default)]
    pub ssh_control_host: Option<String>,

    /// SSH control user
    #[serde(default)]
    pub ssh_control_user: Option<String>,

    /// SSH control port (22 when unset)
    #[serde(default)]
    pub ssh_control_port: Option<u16>,

    /// Base directory of the node's installation on the remote side
    #[serde(default)]
    pub ssh_control_remote_dir: Option<String>,

    /// Local port forwarded to the node's database service
    #[serde(default)]
    pub tunnel_db_port: Option<u16>,

    /// Local port forwarded to the node's internal control service
    #[serde(default)]
    pub tunnel_control_port: Option<u16>,

    /// Host of the node's control service (for the direct, untunneled path)
    #[serde(default)]
    pub control_host: Option<String>,

    /// Port of the node's control service
    #[serde(default)]
    pub control_port: Option<u16>,

    /// URL path prefix of the node's control service
    #[serde(default)]
    pub control_base_dir: Option<String>,

    /// Shared secret; doubles as the node's command-channel token
    pub cache_digest: String,

    /// Site/affiliation derived from the owning principal
    #[serde(default)]
    pub site_affiliation: Option<String>,
}

impl Node {
    /// Create a node with a fresh secret and everything else unset
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            online: true,
            time_of_death: None,
            cache_dir: None,
            ignore_patterns: Vec::new(),
            ssh_control_host: None,
            ssh_control_user: None,
            ssh_control_port: None,
            ssh_control_remote_dir: None,
            tunnel_db_port: None,
            tunnel_control_port: None,
            control_host: None,
            control_port: None,
            control_base_dir: None,
            cache_digest: crate::token::generate_secret(),
            site_affiliation: None,
        }
    }

    /// The node's command-channel token
    pub fn auth_token(&self) -> &str {
        &self.cache_digest
    }

    /// True when both SSH control host and user are configured
    pub fn has_ssh_control_info(&self) -> bool {
        non_blank(&self.ssh_control_host) && non_blank(&self.ssh_control_user)
    }

    /// True when the node can be remote-controlled over SSH (control info
    /// plus the remote base directory)
    pub fn has_remote_control_info(&self) -> bool {
        self.has_ssh_control_info() && non_blank(&self.ssh_control_remote_dir)
    }

    /// True when a database tunnel can be set up
    pub fn has_db_tunneling_info(&self) -> bool {
        self.has_ssh_control_info() && self.tunnel_db_port.is_some()
    }

    /// True when a control-service tunnel can be set up
    pub fn has_control_tunneling_info(&self) -> bool {
        self.has_ssh_control_info() && self.tunnel_control_port.is_some()
    }

    /// Base URL of the node's control service.
    ///
    /// Uses the tunneled `http://localhost:<port>` form when the node has
    /// SSH control info and a control-tunnel port; otherwise the direct
    /// host/port/dir form.
    pub fn site(&self) -> String {
        let dir = self
            .control_base_dir
            .as_deref()
            .unwrap_or("")
            .trim_matches('/');

        let authority = if self.has_ssh_control_info() && self.tunnel_control_port.is_some() {
            format!("localhost:{}", self.tunnel_control_port.unwrap_or_default())
        } else {
            let host = self.control_host.as_deref().unwrap_or("localhost");
            match self.control_port {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            }
        };

        if dir.is_empty() {
            format!("http://{}", authority)
        } else {
            format!("http://{}/{}", authority, dir)
        }
    }

    /// Space-joined view of the ignore patterns
    pub fn spaced_ignore_patterns(&self) -> String {
        self.ignore_patterns.join(" ")
    }

    /// Replace the ignore patterns from a whitespace-separated string
    pub fn set_spaced_ignore_patterns(&mut self, spaced: &str) {
        self.ignore_patterns = spaced.split_whitespace().map(String::from).collect();
    }

    /// Prefix a shell command with the node's environment-priming step.
    ///
    /// Remote shells are non-login, so the node's profile under its remote
    /// base directory is sourced first; without a remote dir the command is
    /// passed through unchanged.
    pub fn prime_shell_command(&self, command: &str) -> String {
        match self.ssh_control_remote_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => {
                format!(
                    "source {}/.gridfleetrc >/dev/null 2>&1; {}",
                    dir.trim_end_matches('/'),
                    command
                )
            }
            _ => command.to_string(),
        }
    }

    /// Validate the writable attributes.
    ///
    /// Called by the registry before any save; a failed validation commits
    /// nothing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(dir) = &self.cache_dir {
            if !dir.is_absolute() {
                return Err(ValidationError::RelativeCachePath(dir.clone()));
            }
        }

        for pattern in &self.ignore_patterns {
            if !is_valid_ignore_pattern(pattern) {
                return Err(ValidationError::InvalidIgnorePattern(pattern.clone()));
            }
        }

        Ok(())
    }
}

fn non_blank(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Check one ignore pattern for syntactic validity.
///
/// A pattern is a single glob token: no whitespace, no path separator, not
/// the match-everything `*`, and only word characters plus a small set of
/// glob punctuation.
pub fn is_valid_ignore_pattern(pattern: &str) -> bool {
    !pattern.is_empty()
        && pattern != "*"
        && pattern
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || IGNORE_PATTERN_CHARS.contains(c))
}
