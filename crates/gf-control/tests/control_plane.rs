//! End-to-end control-plane tests.
//!
//! Each test brings up a real control endpoint on a loopback port and
//! drives it through a `CommandChannel` running on a separate "operator"
//! side, so the full HTTP path (token stamping, dispatch, response
//! mapping) is exercised the way two live nodes would.

use std::net::SocketAddr;
use std::sync::Arc;

use gf_control::locks::NodeLocks;
use gf_control::server::router;
use gf_control::session::SshSessionFactory;
use gf_control::{
    CommandChannel, Dispatcher, FleetError, LivenessTracker, MemoryRegistry, NodeRegistry,
    ServerState, TunnelManager, WorkerPool, WorkerState,
};
use gf_core::error::TransportError;
use gf_core::types::NodeId;
use gf_core::{FleetConfig, Node};
use gf_protocol::RemoteCommand;

struct Cluster {
    addr: SocketAddr,
    server_workers: Arc<WorkerPool>,
    channel: CommandChannel,
    operator_registry: Arc<MemoryRegistry>,
    config: Arc<FleetConfig>,
}

fn coordinator_id() -> NodeId {
    NodeId::new("coordinator")
}

/// Start a coordinator endpoint on an ephemeral port and build an
/// operator-side channel pointed at it. Both sides share node records,
/// so tokens line up exactly as they would after registration.
async fn cluster() -> Cluster {
    let mut coordinator = Node::new("coordinator", "coordinator");
    let operator = Node::new("operator", "operator");
    let config = Arc::new(FleetConfig::default());

    let server_registry = MemoryRegistry::with_nodes(
        coordinator_id(),
        vec![coordinator.clone(), operator.clone()],
    );
    let server_workers = Arc::new(WorkerPool::new());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&server_registry) as Arc<dyn NodeRegistry>,
        Arc::clone(&server_workers),
    ));
    let liveness = Arc::new(LivenessTracker::new(
        Arc::clone(&server_registry) as Arc<dyn NodeRegistry>,
        Arc::clone(&config),
        Arc::new(NodeLocks::new()),
    ));
    let state = ServerState {
        dispatcher,
        liveness,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    // The operator's record of the coordinator points at the bound port.
    coordinator.control_host = Some("127.0.0.1".into());
    coordinator.control_port = Some(addr.port());
    let operator_registry =
        MemoryRegistry::with_nodes(NodeId::new("operator"), vec![coordinator, operator]);
    let operator_dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&operator_registry) as Arc<dyn NodeRegistry>,
        Arc::new(WorkerPool::new()),
    ));
    let tunnels = Arc::new(TunnelManager::new(
        Arc::clone(&operator_registry) as Arc<dyn NodeRegistry>,
        Arc::new(NodeLocks::new()),
        Arc::new(SshSessionFactory::new(&config)),
    ));
    let channel = CommandChannel::new(
        Arc::clone(&operator_registry) as Arc<dyn NodeRegistry>,
        &config,
        operator_dispatcher,
        tunnels,
    );

    Cluster {
        addr,
        server_workers,
        channel,
        operator_registry,
        config,
    }
}

#[tokio::test]
async fn worker_commands_round_trip_over_http() {
    let cluster = cluster().await;
    let id = coordinator_id();

    let processed = cluster.channel.send_command_start_workers(&id).await.unwrap();
    assert_eq!(processed.command, "start_workers");
    assert_eq!(cluster.server_workers.state(), WorkerState::Running);

    cluster.channel.send_command_wakeup_workers(&id).await.unwrap();

    cluster.channel.send_command_stop_workers(&id).await.unwrap();
    assert_eq!(cluster.server_workers.state(), WorkerState::Stopped);
}

#[tokio::test]
async fn tampered_receiver_token_comes_back_as_error_response() {
    let cluster = cluster().await;
    let operator = cluster
        .operator_registry
        .load(&NodeId::new("operator"))
        .await
        .unwrap();

    let forged = RemoteCommand::start_workers().with_tokens(operator.auth_token(), "forged-token");
    let err = cluster
        .channel
        .send_command(&coordinator_id(), forged)
        .await;
    match err {
        Err(FleetError::Transport(TransportError::Remote(message))) => {
            assert!(message.contains("Receiver token"), "got: {}", message);
        }
        other => panic!("expected remote error response, got {:?}", other.map(|c| c.command)),
    }
    // The endpoint never acted on the forged command.
    assert_eq!(cluster.server_workers.state(), WorkerState::Stopped);
}

#[tokio::test]
async fn unknown_command_reports_missing_handler() {
    let cluster = cluster().await;
    let operator = cluster
        .operator_registry
        .load(&NodeId::new("operator"))
        .await
        .unwrap();
    let coordinator = cluster
        .operator_registry
        .load(&coordinator_id())
        .await
        .unwrap();

    let command = RemoteCommand::named("rewire_dilithium")
        .with_tokens(operator.auth_token(), coordinator.auth_token());
    let err = cluster.channel.send_command(&coordinator_id(), command).await;
    match err {
        Err(FleetError::Transport(TransportError::Remote(message))) => {
            assert!(message.contains("rewire_dilithium"));
        }
        other => panic!("expected routing error response, got {:?}", other.map(|c| c.command)),
    }

    // The endpoint still serves valid commands afterwards.
    cluster
        .channel
        .send_command_start_workers(&coordinator_id())
        .await
        .unwrap();
}

#[tokio::test]
async fn nameless_command_is_a_bad_request() {
    let cluster = cluster().await;
    let url = format!("http://{}/command", cluster.addr);

    let response = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({ "command": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn info_endpoint_serves_the_local_snapshot() {
    let cluster = cluster().await;
    let url = format!("http://{}/info", cluster.addr);

    let snapshot: gf_protocol::LivenessSnapshot =
        reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(snapshot.name, "coordinator");
    assert!(!snapshot.host.is_empty());
    assert!(snapshot.pid > 0);
}

#[tokio::test]
async fn liveness_check_sees_the_live_endpoint() {
    let cluster = cluster().await;

    // An operator-side tracker queries the coordinator over real HTTP.
    let tracker = LivenessTracker::new(
        Arc::clone(&cluster.operator_registry) as Arc<dyn NodeRegistry>,
        Arc::clone(&cluster.config),
        Arc::new(NodeLocks::new()),
    );
    assert!(tracker.is_alive(&coordinator_id()).await.unwrap());

    let node = cluster
        .operator_registry
        .load(&coordinator_id())
        .await
        .unwrap();
    assert!(node.time_of_death.is_none());
}
