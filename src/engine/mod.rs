//! The in-memory order-book engine: per-token books, single-writer
//! workers, and the router that dispatches to them.

pub mod book;
pub mod router;
pub mod worker;

pub use book::OrderBook;
pub use router::{Engine, EngineConfig, Snapshot};
