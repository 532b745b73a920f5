//! SSH control sessions
//!
//! One persistent SSH connection per node, used for both port forwarding
//! and remote shell execution. The [`ControlSession`] trait is the
//! capability boundary: the tunnel manager and command channel only see the
//! trait, so tests substitute a scripted session and deployments that front
//! SSH differently can plug in their own.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use gf_core::error::TransportError;
use gf_core::types::NodeId;
use gf_core::{FleetConfig, Node};

/// Default SSH port when the node doesn't configure one
const DEFAULT_SSH_PORT: u16 = 22;

/// One forwarded port mapping on a control session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSpec {
    /// Local listening port
    pub local_port: u16,
    /// Host to connect to from the remote end
    pub remote_host: String,
    /// Port to connect to from the remote end
    pub remote_port: u16,
}

/// A node's persistent SSH control connection
#[async_trait]
pub trait ControlSession: Send + Sync {
    /// True when the underlying connection is up
    async fn is_alive(&self) -> bool;

    /// Establish the connection; no-op when already alive.
    ///
    /// At most one start/stop transition runs at a time.
    async fn start(&self) -> Result<(), TransportError>;

    /// Add a forwarded tunnel; idempotent for an identical spec
    async fn add_tunnel(&self, spec: TunnelSpec) -> Result<(), TransportError>;

    /// Tear down every forwarded tunnel, leaving the connection up
    async fn clear_tunnels(&self);

    /// Currently forwarded tunnels
    async fn tunnels(&self) -> Vec<TunnelSpec>;

    /// Tear down the connection and all its tunnels
    async fn destroy(&self);

    /// Run a shell command remotely and collect its output
    async fn exec_read(&self, command: &str) -> Result<String, TransportError>;

    /// Run a shell command remotely, feeding it the given input
    async fn exec_write(&self, command: &str, input: &str) -> Result<(), TransportError>;
}

/// Creates control sessions for nodes; the tunnel manager owns one factory
pub trait SessionFactory: Send + Sync {
    /// Create a (not yet started) session for a node
    fn create(&self, node: &Node) -> Arc<dyn ControlSession>;
}

/// Factory producing russh-backed sessions
pub struct SshSessionFactory {
    key_path: Option<PathBuf>,
    connect_timeout: Duration,
}

impl SshSessionFactory {
    /// Build a factory from the fleet configuration
    pub fn new(config: &FleetConfig) -> Self {
        Self {
            key_path: config.ssh_key_path.clone(),
            connect_timeout: config.ssh_connect_timeout,
        }
    }
}

impl SessionFactory for SshSessionFactory {
    fn create(&self, node: &Node) -> Arc<dyn ControlSession> {
        Arc::new(SshControlSession::for_node(
            node,
            self.key_path.clone(),
            self.connect_timeout,
        ))
    }
}

struct ActiveTunnel {
    spec: TunnelSpec,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct SessionState {
    handle: Option<Arc<Handle<ControlHandler>>>,
    tunnels: Vec<ActiveTunnel>,
}

/// russh-backed [`ControlSession`]
pub struct SshControlSession {
    node_id: NodeId,
    host: String,
    user: String,
    port: u16,
    key_path: Option<PathBuf>,
    connect_timeout: Duration,
    // Guards the start/stop transition and the tunnel set
    state: Mutex<SessionState>,
}

impl SshControlSession {
    /// Create a session from a node's SSH control fields
    pub fn for_node(node: &Node, key_path: Option<PathBuf>, connect_timeout: Duration) -> Self {
        Self {
            node_id: node.id.clone(),
            host: node.ssh_control_host.clone().unwrap_or_default(),
            user: node.ssh_control_user.clone().unwrap_or_default(),
            port: node.ssh_control_port.unwrap_or(DEFAULT_SSH_PORT),
            key_path,
            connect_timeout,
            state: Mutex::new(SessionState::default()),
        }
    }

    async fn live_handle(&self) -> Result<Arc<Handle<ControlHandler>>, TransportError> {
        let state = self.state.lock().await;
        match &state.handle {
            Some(handle) if !handle.is_closed() => Ok(Arc::clone(handle)),
            _ => Err(TransportError::Session(format!(
                "control session for node {} is not started",
                self.node_id
            ))),
        }
    }
}

#[async_trait]
impl ControlSession for SshControlSession {
    async fn is_alive(&self) -> bool {
        let state = self.state.lock().await;
        state
            .handle
            .as_ref()
            .map(|handle| !handle.is_closed())
            .unwrap_or(false)
    }

    async fn start(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if let Some(handle) = &state.handle {
            if !handle.is_closed() {
                return Ok(());
            }
        }

        let key_path = self.key_path.as_ref().ok_or_else(|| {
            TransportError::Session("no SSH private key configured".to_string())
        })?;
        let key = russh_keys::load_secret_key(key_path, None).map_err(|e| {
            TransportError::Session(format!("failed to load key {}: {}", key_path.display(), e))
        })?;

        let config = Arc::new(client::Config::default());
        tracing::debug!(node = %self.node_id, host = %self.host, port = self.port, "connecting control session");
        let mut handle = tokio::time::timeout(
            self.connect_timeout,
            client::connect(config, (self.host.as_str(), self.port), ControlHandler),
        )
        .await
        .map_err(|_| TransportError::Unreachable(format!("{}:{}", self.host, self.port)))?
        .map_err(|e| TransportError::Session(format!("connect failed: {}", e)))?;

        let authenticated = handle
            .authenticate_publickey(&self.user, Arc::new(key))
            .await
            .map_err(|e| TransportError::Session(format!("authentication error: {}", e)))?;
        if !authenticated {
            return Err(TransportError::Session(format!(
                "authentication rejected for {}@{}",
                self.user, self.host
            )));
        }

        tracing::info!(node = %self.node_id, "control session established");
        state.handle = Some(Arc::new(handle));
        Ok(())
    }

    async fn add_tunnel(&self, spec: TunnelSpec) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        let handle = match &state.handle {
            Some(handle) if !handle.is_closed() => Arc::clone(handle),
            _ => {
                return Err(TransportError::Session(format!(
                    "control session for node {} is not started",
                    self.node_id
                )))
            }
        };

        if state.tunnels.iter().any(|t| t.spec == spec) {
            return Ok(());
        }

        let listener = TcpListener::bind(("127.0.0.1", spec.local_port))
            .await
            .map_err(|e| {
                TransportError::Session(format!(
                    "failed to bind local port {}: {}",
                    spec.local_port, e
                ))
            })?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(forward_loop(
            handle,
            listener,
            spec.clone(),
            cancel.clone(),
        ));
        tracing::debug!(node = %self.node_id, local = spec.local_port,
            remote = %format!("{}:{}", spec.remote_host, spec.remote_port), "tunnel added");
        state.tunnels.push(ActiveTunnel { spec, cancel, task });
        Ok(())
    }

    async fn clear_tunnels(&self) {
        let mut state = self.state.lock().await;
        for tunnel in state.tunnels.drain(..) {
            tunnel.cancel.cancel();
            tunnel.task.abort();
        }
    }

    async fn tunnels(&self) -> Vec<TunnelSpec> {
        let state = self.state.lock().await;
        state.tunnels.iter().map(|t| t.spec.clone()).collect()
    }

    async fn destroy(&self) {
        let mut state = self.state.lock().await;
        for tunnel in state.tunnels.drain(..) {
            tunnel.cancel.cancel();
            tunnel.task.abort();
        }
        if let Some(handle) = state.handle.take() {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "closing", "en")
                .await;
            tracing::info!(node = %self.node_id, "control session destroyed");
        }
    }

    async fn exec_read(&self, command: &str) -> Result<String, TransportError> {
        let handle = self.live_handle().await?;
        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::Session(format!("channel open failed: {}", e)))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| TransportError::Session(format!("exec failed: {}", e)))?;

        let mut output = Vec::new();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => output.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status } => {
                    tracing::debug!(node = %self.node_id, exit_status, "remote command finished");
                }
                _ => {}
            }
        }
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn exec_write(&self, command: &str, input: &str) -> Result<(), TransportError> {
        let handle = self.live_handle().await?;
        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| TransportError::Session(format!("channel open failed: {}", e)))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| TransportError::Session(format!("exec failed: {}", e)))?;
        channel
            .data(input.as_bytes())
            .await
            .map_err(|e| TransportError::Session(format!("write failed: {}", e)))?;
        channel
            .eof()
            .await
            .map_err(|e| TransportError::Session(format!("eof failed: {}", e)))?;

        while let Some(msg) = channel.wait().await {
            if let ChannelMsg::ExitStatus { exit_status } = msg {
                tracing::debug!(node = %self.node_id, exit_status, "remote command finished");
            }
        }
        Ok(())
    }
}

/// Accept loop for one forwarded tunnel
async fn forward_loop(
    handle: Arc<Handle<ControlHandler>>,
    listener: TcpListener,
    spec: TunnelSpec,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((local, peer)) => {
                        tokio::spawn(forward_connection(
                            Arc::clone(&handle),
                            local,
                            peer,
                            spec.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(local = spec.local_port, "tunnel accept failed: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

async fn forward_connection(
    handle: Arc<Handle<ControlHandler>>,
    mut local: TcpStream,
    peer: SocketAddr,
    spec: TunnelSpec,
) {
    match handle
        .channel_open_direct_tcpip(
            &spec.remote_host,
            spec.remote_port as u32,
            &peer.ip().to_string(),
            peer.port() as u32,
        )
        .await
    {
        Ok(channel) => {
            let mut remote = channel.into_stream();
            if let Err(e) = tokio::io::copy_bidirectional(&mut local, &mut remote).await {
                tracing::debug!(local = spec.local_port, "tunnel stream ended: {}", e);
            }
        }
        Err(e) => {
            tracing::warn!(
                remote = %format!("{}:{}", spec.remote_host, spec.remote_port),
                "direct-tcpip open failed: {}", e
            );
        }
    }
}

/// SSH client handler for control sessions
struct ControlHandler;

#[async_trait]
impl client::Handler for ControlHandler {
    type Error = anyhow::Error;

    /// Accept the server key after logging its fingerprint.
    ///
    /// Control hosts live on a trusted management network; known-hosts
    /// pinning is handled by the surrounding deployment.
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("server host key: {}", server_public_key.fingerprint());
        Ok(true)
    }
}
