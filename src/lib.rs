//! Real-time order-book collector for prediction-market venues.
//!
//! Exposes the core modules for use by the binary and by integration
//! tests: typed configuration, the error taxonomy, the per-token engine,
//! the snapshot writer, the store abstraction, and venue adapters.

pub mod config;
pub mod engine;
pub mod error;
pub mod platform;
pub mod snapshot;
pub mod store;
pub mod types;

pub use config::Config;
pub use engine::{Engine, EngineConfig};
pub use error::{CollectorError, Result};
pub use snapshot::{SnapshotWriter, SnapshotWriterConfig};
