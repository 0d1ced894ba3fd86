//! SDK-side heartbeat producer (spec §4.1), scheduled on a fixed tick and
//! grounded on the teacher's tick-driven `run_heartbeat_loop` shape,
//! reimplemented over `tokio::time::interval` since this workspace carries
//! no bespoke executor crate.

pub mod descriptor;
pub mod producer;
pub mod scheduler;

pub use descriptor::HeartbeatDescriptor;
pub use producer::HeartbeatProducer;
pub use scheduler::HeartbeatScheduler;
