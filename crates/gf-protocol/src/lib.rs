//! gf-protocol: Administrative command protocol for GridFleet
//!
//! This crate defines the typed objects exchanged between fleet members:
//! remote commands with their token envelope, liveness snapshots, and the
//! HTTP request/response wire shapes. Transport lives in gf-control.
//!
//! # Message Flow
//!
//! 1. A sender builds a named `RemoteCommand` (builders validate arguments)
//! 2. The command channel stamps sender/receiver tokens and POSTs it to the
//!    target's `/command` endpoint (or dispatches in-process on the self node)
//! 3. The dispatcher authenticates both tokens, routes by command name, and
//!    answers with a `CommandResponse` carrying the command back or an error
//! 4. Liveness checks GET `/info` and receive a `LivenessSnapshot`; any
//!    transport failure degrades to the dummy snapshot

pub mod command;
pub mod error;
pub mod info;
pub mod wire;

pub use command::{commands, CleanCacheArgs, RemoteCommand, TimeBound};
pub use error::ProtocolError;
pub use info::LivenessSnapshot;
pub use wire::CommandResponse;
