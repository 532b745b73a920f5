//! Command dispatch
//!
//! The receiving half of the command channel. Every inbound
//! [`RemoteCommand`] goes through the same gauntlet: a missing name is
//! fatal and bubbles to the caller, everything after that degrades to an
//! error response so a bad command can never take the dispatcher down.
//!
//! Routing is an explicit name-to-handler table. Unknown names are
//! reported, not invented.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use gf_core::error::{AuthError, RoutingError};
use gf_core::time::current_time_millis;
use gf_core::token::tokens_match;
use gf_core::types::NodeId;
use gf_protocol::{commands, CommandResponse, ProtocolError, RemoteCommand};

use crate::error::FleetError;
use crate::registry::NodeRegistry;
use crate::workers::WorkerPool;

/// Shared state handlers act on
pub struct HandlerContext {
    /// Node store; handlers mutate sync-status rows through it
    pub registry: Arc<dyn NodeRegistry>,
    /// The local worker pool
    pub workers: Arc<WorkerPool>,
}

/// One registered command implementation
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Execute the command on behalf of an authenticated sender
    async fn handle(
        &self,
        command: &RemoteCommand,
        sender: &NodeId,
        ctx: &HandlerContext,
    ) -> Result<(), FleetError>;
}

/// Routes authenticated commands to their handlers
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    ctx: HandlerContext,
}

impl Dispatcher {
    /// Create a dispatcher with the built-in worker and cache handlers
    pub fn new(registry: Arc<dyn NodeRegistry>, workers: Arc<WorkerPool>) -> Self {
        let mut dispatcher = Self {
            handlers: HashMap::new(),
            ctx: HandlerContext { registry, workers },
        };
        dispatcher.register(commands::CLEAN_CACHE, Arc::new(CleanCacheHandler));
        dispatcher.register(commands::START_WORKERS, Arc::new(StartWorkersHandler));
        dispatcher.register(commands::STOP_WORKERS, Arc::new(StopWorkersHandler));
        dispatcher.register(commands::WAKEUP_WORKERS, Arc::new(WakeupWorkersHandler));
        dispatcher
    }

    /// Register (or replace) the handler for a command name
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Authenticate and execute one command.
    ///
    /// A nameless command is malformed and returns `Err`; every other
    /// failure, including authentication, becomes an error response.
    pub async fn process(&self, command: RemoteCommand) -> Result<CommandResponse, FleetError> {
        if !command.has_name() {
            return Err(ProtocolError::MissingCommandName.into());
        }

        let self_node = self.ctx.registry.load(self.ctx.registry.self_id()).await?;
        if !tokens_match(&command.receiver_token, self_node.auth_token()) {
            tracing::warn!(command = %command.command, "rejected command: receiver token mismatch");
            return Ok(CommandResponse::error(
                AuthError::BadReceiverToken.to_string(),
            ));
        }

        let sender = match self.ctx.registry.find_by_token(&command.sender_token).await {
            Some(id) => id,
            None => {
                tracing::warn!(command = %command.command, "rejected command: unknown sender token");
                return Ok(CommandResponse::error(
                    AuthError::UnknownSenderToken.to_string(),
                ));
            }
        };

        let handler = match self.handlers.get(&command.command) {
            Some(handler) => Arc::clone(handler),
            None => {
                let err = RoutingError::NoHandler(command.command.clone());
                tracing::warn!("{}", err);
                return Ok(CommandResponse::error(err.to_string()));
            }
        };

        tracing::info!(command = %command.command, sender = %sender, "executing command");
        match handler.handle(&command, &sender, &self.ctx).await {
            Ok(()) => Ok(CommandResponse::ok(command)),
            Err(e) => {
                tracing::warn!(command = %command.command, "command failed: {}", e);
                Ok(CommandResponse::error(e.to_string()))
            }
        }
    }
}

/// Purges local sync-status rows matching the command's items and bounds
struct CleanCacheHandler;

#[async_trait]
impl CommandHandler for CleanCacheHandler {
    async fn handle(
        &self,
        command: &RemoteCommand,
        _sender: &NodeId,
        ctx: &HandlerContext,
    ) -> Result<(), FleetError> {
        let args = command.clean_cache_args()?;
        let now = current_time_millis();
        let older = args.older_than.map(|b| b.cutoff_millis(now));
        let younger = args.younger_than.map(|b| b.cutoff_millis(now));

        let removed = ctx
            .registry
            .remove_sync_statuses(ctx.registry.self_id(), &args.item_ids, older, younger)
            .await?;
        tracing::info!(removed, "cache cleanup done");
        Ok(())
    }
}

struct StartWorkersHandler;

#[async_trait]
impl CommandHandler for StartWorkersHandler {
    async fn handle(
        &self,
        _command: &RemoteCommand,
        _sender: &NodeId,
        ctx: &HandlerContext,
    ) -> Result<(), FleetError> {
        ctx.workers.start();
        Ok(())
    }
}

struct StopWorkersHandler;

#[async_trait]
impl CommandHandler for StopWorkersHandler {
    async fn handle(
        &self,
        _command: &RemoteCommand,
        _sender: &NodeId,
        ctx: &HandlerContext,
    ) -> Result<(), FleetError> {
        ctx.workers.stop();
        Ok(())
    }
}

struct WakeupWorkersHandler;

#[async_trait]
impl CommandHandler for WakeupWorkersHandler {
    async fn handle(
        &self,
        _command: &RemoteCommand,
        _sender: &NodeId,
        ctx: &HandlerContext,
    ) -> Result<(), FleetError> {
        ctx.workers.wakeup();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use crate::workers::WorkerState;
    use gf_core::sync::SyncStatus;
    use gf_core::Node;
    use serde_json::json;

    struct Fixture {
        dispatcher: Dispatcher,
        registry: Arc<MemoryRegistry>,
        workers: Arc<WorkerPool>,
        self_token: String,
        peer_token: String,
    }

    fn fixture() -> Fixture {
        let coordinator = Node::new("coordinator", "coordinator");
        let peer = Node::new("exec-01", "exec-01");
        let self_token = coordinator.auth_token().to_string();
        let peer_token = peer.auth_token().to_string();

        let registry = MemoryRegistry::with_nodes(NodeId::new("coordinator"), vec![coordinator, peer]);
        let workers = Arc::new(WorkerPool::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry) as Arc<dyn NodeRegistry>,
            Arc::clone(&workers),
        );
        Fixture {
            dispatcher,
            registry,
            workers,
            self_token,
            peer_token,
        }
    }

    impl Fixture {
        fn stamped(&self, command: RemoteCommand) -> RemoteCommand {
            command.with_tokens(&self.peer_token, &self.self_token)
        }
    }

    #[tokio::test]
    async fn test_nameless_command_is_fatal() {
        let f = fixture();
        let command = f.stamped(RemoteCommand::named(""));
        let result = f.dispatcher.process(command).await;
        assert!(matches!(result, Err(FleetError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_bad_receiver_token_is_an_error_response() {
        let f = fixture();
        let command = RemoteCommand::start_workers().with_tokens(&f.peer_token, "wrong-token");
        let response = f.dispatcher.process(command).await.unwrap();
        assert!(response.is_error());
        // The dispatcher survives and keeps serving.
        let ok = f.stamped(RemoteCommand::start_workers());
        assert!(!f.dispatcher.process(ok).await.unwrap().is_error());
    }

    #[tokio::test]
    async fn test_unknown_sender_token_is_rejected() {
        let f = fixture();
        let command = RemoteCommand::start_workers().with_tokens("nobody", &f.self_token);
        let response = f.dispatcher.process(command).await.unwrap();
        assert!(response.is_error());
        assert_eq!(f.workers.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_unknown_command_name_reports_no_handler() {
        let f = fixture();
        let command = f.stamped(RemoteCommand::named("reboot_universe"));
        let response = f.dispatcher.process(command).await.unwrap();
        assert!(response.is_error());
        assert!(response.error.unwrap().contains("reboot_universe"));
    }

    #[tokio::test]
    async fn test_worker_commands_drive_the_pool() {
        let f = fixture();

        let response = f
            .dispatcher
            .process(f.stamped(RemoteCommand::start_workers()))
            .await
            .unwrap();
        assert!(!response.is_error());
        assert_eq!(f.workers.state(), WorkerState::Running);

        f.dispatcher
            .process(f.stamped(RemoteCommand::wakeup_workers()))
            .await
            .unwrap();

        f.dispatcher
            .process(f.stamped(RemoteCommand::stop_workers()))
            .await
            .unwrap();
        assert_eq!(f.workers.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_clean_cache_removes_matching_rows() {
        let f = fixture();
        let self_id = NodeId::new("coordinator");

        let mut stale = SyncStatus::synced(self_id.clone(), "item-1");
        stale.updated_at = 1_000;
        f.registry.add_sync_status(stale).await.unwrap();
        f.registry
            .add_sync_status(SyncStatus::synced(self_id.clone(), "item-2"))
            .await
            .unwrap();

        // Age bound of one hour: only the ancient row qualifies.
        let command = RemoteCommand::clean_cache(
            &["item-1".to_string(), "item-2".to_string()],
            Some(json!(3600)),
            None,
        )
        .unwrap();
        let response = f.dispatcher.process(f.stamped(command)).await.unwrap();
        assert!(!response.is_error());
        assert_eq!(f.registry.sync_status_count(&self_id).await, 1);
    }

    #[tokio::test]
    async fn test_response_echoes_the_command() {
        let f = fixture();
        let response = f
            .dispatcher
            .process(f.stamped(RemoteCommand::start_workers()))
            .await
            .unwrap();
        assert_eq!(response.command.unwrap().command, "start_workers");
    }
}
