//! Command channel
//!
//! The sending half of node-to-node control. Commands addressed to the
//! local node short-circuit into the in-process [`Dispatcher`]; commands
//! for a remote node travel as JSON over the node's `/command` endpoint.
//! Either way the caller gets back the processed command or an error.
//!
//! The channel also fronts remote shell execution over a node's SSH
//! control session, priming the remote environment first.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use gf_core::error::{PreconditionError, TransportError};
use gf_core::types::NodeId;
use gf_core::{FleetConfig, Node};
use gf_protocol::{CommandResponse, ProtocolError, RemoteCommand};

use crate::dispatch::Dispatcher;
use crate::error::FleetError;
use crate::registry::NodeRegistry;
use crate::tunnel::TunnelManager;

/// Sends commands and shell executions to fleet nodes
pub struct CommandChannel {
    registry: Arc<dyn NodeRegistry>,
    dispatcher: Arc<Dispatcher>,
    tunnels: Arc<TunnelManager>,
    http: reqwest::Client,
    command_timeout: Duration,
}

impl CommandChannel {
    /// Create a channel backed by the given dispatcher and tunnel manager
    pub fn new(
        registry: Arc<dyn NodeRegistry>,
        config: &FleetConfig,
        dispatcher: Arc<Dispatcher>,
        tunnels: Arc<TunnelManager>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            tunnels,
            http: reqwest::Client::new(),
            command_timeout: config.command_timeout,
        }
    }

    /// Send a command to a node, returning the processed command.
    ///
    /// A nameless command is rejected before any I/O. Remote transport
    /// failures and error responses come back as recoverable errors.
    pub async fn send_command(
        &self,
        id: &NodeId,
        command: RemoteCommand,
    ) -> Result<RemoteCommand, FleetError> {
        if !command.has_name() {
            return Err(ProtocolError::MissingCommandName.into());
        }

        let response = if id == self.registry.self_id() {
            self.dispatcher.process(command).await?
        } else {
            let node = self.registry.load(id).await?;
            self.post_command(&node, &command).await?
        };

        match response {
            CommandResponse {
                command: Some(processed),
                ..
            } => Ok(processed),
            CommandResponse {
                error: Some(message),
                ..
            } => Err(TransportError::Remote(message).into()),
            _ => Err(TransportError::Remote("empty response".to_string()).into()),
        }
    }

    /// Send a `clean_cache` command with stamped tokens.
    ///
    /// Bounds are raw JSON values; anything that isn't a timestamp or an
    /// age in seconds fails before leaving this process.
    pub async fn send_command_clean_cache(
        &self,
        id: &NodeId,
        item_ids: &[String],
        older_than: Option<Value>,
        younger_than: Option<Value>,
    ) -> Result<RemoteCommand, FleetError> {
        let command = RemoteCommand::clean_cache(item_ids, older_than, younger_than)?;
        let command = self.stamped(id, command).await?;
        self.send_command(id, command).await
    }

    /// Send a `start_workers` command with stamped tokens
    pub async fn send_command_start_workers(
        &self,
        id: &NodeId,
    ) -> Result<RemoteCommand, FleetError> {
        let command = self.stamped(id, RemoteCommand::start_workers()).await?;
        self.send_command(id, command).await
    }

    /// Send a `stop_workers` command with stamped tokens
    pub async fn send_command_stop_workers(
        &self,
        id: &NodeId,
    ) -> Result<RemoteCommand, FleetError> {
        let command = self.stamped(id, RemoteCommand::stop_workers()).await?;
        self.send_command(id, command).await
    }

    /// Send a `wakeup_workers` command with stamped tokens
    pub async fn send_command_wakeup_workers(
        &self,
        id: &NodeId,
    ) -> Result<RemoteCommand, FleetError> {
        let command = self.stamped(id, RemoteCommand::wakeup_workers()).await?;
        self.send_command(id, command).await
    }

    /// Run a shell command on a node and collect its output
    pub async fn read_from_remote_shell_command(
        &self,
        id: &NodeId,
        shell_command: &str,
    ) -> Result<String, FleetError> {
        let (node, session) = self.live_session(id).await?;
        let primed = node.prime_shell_command(shell_command);
        Ok(session.exec_read(&primed).await?)
    }

    /// Run a shell command on a node, feeding it the given input
    pub async fn write_to_remote_shell_command(
        &self,
        id: &NodeId,
        shell_command: &str,
        input: &str,
    ) -> Result<(), FleetError> {
        let (node, session) = self.live_session(id).await?;
        let primed = node.prime_shell_command(shell_command);
        Ok(session.exec_write(&primed, input).await?)
    }

    /// The command-channel token of a node
    pub async fn auth_token(&self, id: &NodeId) -> Result<String, FleetError> {
        let node = self.registry.load(id).await?;
        Ok(node.auth_token().to_string())
    }

    /// True when some registered node owns the candidate token
    pub async fn valid_token(&self, candidate: &str) -> bool {
        self.registry.find_by_token(candidate).await.is_some()
    }

    /// Stamp a command with the local sender token and the target's
    /// receiver token
    async fn stamped(
        &self,
        id: &NodeId,
        command: RemoteCommand,
    ) -> Result<RemoteCommand, FleetError> {
        let me = self.registry.load(self.registry.self_id()).await?;
        let target = self.registry.load(id).await?;
        Ok(command.with_tokens(me.auth_token(), target.auth_token()))
    }

    async fn post_command(
        &self,
        node: &Node,
        command: &RemoteCommand,
    ) -> Result<CommandResponse, FleetError> {
        let url = format!("{}/command", node.site());
        tracing::debug!(node = %node.id, command = %command.command, url = %url, "posting command");
        let response = self
            .http
            .post(&url)
            .timeout(self.command_timeout)
            .json(command)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        let parsed = response
            .json::<CommandResponse>()
            .await
            .map_err(|e| TransportError::Remote(e.to_string()))?;
        Ok(parsed)
    }

    /// Load a node and its control session, insisting both are usable
    async fn live_session(
        &self,
        id: &NodeId,
    ) -> Result<(Node, Arc<dyn crate::session::ControlSession>), FleetError> {
        let node = self.registry.load(id).await?;
        if node.id == *self.registry.self_id() {
            return Err(PreconditionError::SelfNode.into());
        }
        if !node.has_ssh_control_info() {
            return Err(PreconditionError::MissingSshControlInfo(node.id.clone()).into());
        }
        let session = self.tunnels.session_for(&node);
        if !session.is_alive().await {
            return Err(PreconditionError::SessionNotAlive(node.id.clone()).into());
        }
        Ok((node, session))
    }
}
