//! Tiered L1/L2 cache engine (spec §4.4). No direct teacher counterpart —
//! grounded on the spec itself and enriched with `moka` for the bounded,
//! TTL-aware L1 tier and `flate2` for the required GZIP compression, the
//! crates this pack's workspaces reach for when they need exactly this
//! shape of cache.

pub mod compression;
pub mod engine;
pub mod error;
pub mod provider;
pub mod single_flight;

pub use compression::CompressingSerializer;
pub use engine::{CacheEngine, CacheStatus};
pub use error::CacheError;
pub use provider::{CacheProvider, DistributedBackend, LocalCache, NoopCache, ProviderKind, TieredCache};
