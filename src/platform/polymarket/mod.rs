//! The Polymarket venue adapter: wire formats, REST catalog client,
//! stream client, and the `Adapter` impl tying them together.

pub mod adapter;
pub mod rest;
pub mod stream;
pub mod wire;

pub use adapter::PolymarketAdapter;
