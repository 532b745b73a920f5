//! HTTP control endpoint
//!
//! Every node runs this small axum surface: `POST /command` feeds the
//! dispatcher, `GET /info` serves the local liveness snapshot. Remote
//! command channels and liveness trackers are the only intended clients.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use gf_protocol::{CommandResponse, LivenessSnapshot, RemoteCommand};

use crate::dispatch::Dispatcher;
use crate::error::FleetError;
use crate::liveness::LivenessTracker;

/// Shared state behind the control routes
#[derive(Clone)]
pub struct ServerState {
    /// Executes inbound commands
    pub dispatcher: Arc<Dispatcher>,
    /// Answers local liveness queries
    pub liveness: Arc<LivenessTracker>,
}

/// Build the control router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/command", post(command))
        .route("/info", get(info))
        .with_state(state)
}

/// Bind and serve the control endpoint until the listener fails
pub async fn serve(bind_address: &str, state: ServerState) -> Result<(), FleetError> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!(address = %bind_address, "control endpoint listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn command(
    State(state): State<ServerState>,
    Json(command): Json<RemoteCommand>,
) -> (StatusCode, Json<CommandResponse>) {
    match state.dispatcher.process(command).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        // A malformed command never reaches a handler; tell the sender.
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(CommandResponse::error(e.to_string())),
        ),
    }
}

async fn info(State(state): State<ServerState>) -> (StatusCode, Json<LivenessSnapshot>) {
    match state.liveness.self_snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)),
        Err(e) => {
            tracing::warn!("self snapshot failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LivenessSnapshot::dummy()),
            )
        }
    }
}
