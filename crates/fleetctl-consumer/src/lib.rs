//! Batch-oriented, manual-commit heartbeat consumer (spec §4.1), grounded on
//! the broker and projection-store crates' contracts plus the resilience
//! fabric's cancellable-wait convention for retry backoff.

pub mod retry_counter;
pub mod state;
pub mod worker;

pub use retry_counter::RetryCounter;
pub use state::BatchStateMachine;
pub use worker::BatchConsumer;
