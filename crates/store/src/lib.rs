//! LanceDB-backed storage for files, chunks, embeddings, symbols, links and
//! usage metrics.

pub mod bootstrap;
pub mod cascade;
pub mod chunks;
pub mod connection;
pub mod error;
pub mod files;
pub mod links;
pub mod schema;
pub mod stats;
pub mod symbols;
pub mod usage_metrics;

pub use connection::Store;
pub use error::{Result, StoreError};
