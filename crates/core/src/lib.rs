//! # vectord-core
//!
//! Multi-collection approximate-nearest-neighbor vector database engine:
//! HNSW graph indices over named collections, with concurrent point
//! insert/delete, top-k similarity search, parallel batch queries, and
//! recoverable on-disk snapshots.
//!
//! This is the core library crate with zero async dependencies. The HTTP
//! front-end lives in `vectord-server`; other transports can embed this
//! crate directly.

/// Compile-time defaults, limits, and tuning parameters.
pub mod config;
/// The `VectorError` kinds surfaced by every public API.
pub mod error;
/// HNSW graph: structure, insertion, search, and distance metrics.
pub mod hnsw;
/// Record, configuration, and stats types.
pub mod record;
/// Collections, the collection manager, and persistence.
pub mod storage;

pub use error::{Result, VectorError};
pub use hnsw::DistanceMetric;
pub use record::{CollectionConfig, CollectionStats, VectorRecord};
pub use storage::{Collection, SearchHit, VectorStore};
