//! Kernel types, error taxonomy, deadline propagation, resilience governance
//! and ambient configuration/observability shared by every `fleetctl` crate.

pub mod config;
pub mod context;
pub mod error;
pub mod governance;
pub mod heartbeat;
pub mod ids;
pub mod model;
pub mod observability;

pub use error::{ErrorCategory, FleetError, Result};
pub use heartbeat::{compute_config_hash, HeartbeatPayload};
