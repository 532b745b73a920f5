//! gf-control: GridFleet control plane
//!
//! Coordinates a fleet of compute/storage nodes: liveness tracking with a
//! death-grace-period state machine, SSH control sessions with forwarded
//! tunnels, and the token-authenticated command channel with its dispatcher.
//!
//! All node state mutations go through the [`registry::NodeRegistry`];
//! operations on one node are serialized by [`locks::NodeLocks`] while
//! different nodes proceed in parallel.

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod liveness;
pub mod locks;
pub mod registry;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod tunnel;
pub mod workers;

pub use channel::CommandChannel;
pub use dispatch::{CommandHandler, Dispatcher, HandlerContext};
pub use error::FleetError;
pub use liveness::{LivenessTracker, SnapshotFetcher};
pub use registry::{MemoryRegistry, NodeRegistry};
pub use server::ServerState;
pub use session::{ControlSession, SessionFactory, TunnelSpec};
pub use telemetry::init_tracing;
pub use tunnel::TunnelManager;
pub use workers::{WorkerPool, WorkerState};
