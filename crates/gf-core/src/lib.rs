//! gf-core: Core domain model and configuration for GridFleet
//!
//! This crate provides the node model, fleet configuration, error taxonomy,
//! and token/time utilities shared by the protocol and control-plane crates.

pub mod config;
pub mod error;
pub mod node;
pub mod sync;
pub mod time;
pub mod token;
pub mod types;

pub use config::FleetConfig;
pub use error::ValidationError;
pub use node::Node;
pub use types::NodeId;
