//! Global configuration constants for vectord.
//!
//! Compile-time defaults and input validation limits. Runtime configuration
//! (ports, data directory) is handled via CLI arguments and environment
//! variables in the server binary.

/// Default number of bidirectional links per HNSW node.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default candidate-list size during HNSW index construction.
///
/// Higher values produce a better graph at the cost of slower inserts.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default candidate-list size during search.
///
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Maximum number of layers in the HNSW graph.
pub const HNSW_MAX_LAYERS: usize = 16;

/// Default capacity limit per collection.
pub const DEFAULT_MAX_ELEMENTS: usize = 1_000_000;

/// Maximum allowed vector dimension.
pub const MAX_DIMENSION: usize = 4096;

/// Maximum number of results (`k`) per search request.
pub const MAX_K: usize = 10_000;

/// Maximum length of a collection name in characters.
pub const MAX_COLLECTION_NAME_LEN: usize = 128;

/// Maximum number of vectors per batch request at the HTTP surface.
pub const MAX_BATCH_SIZE: usize = 1_000;

/// Batch searches at or below this size run sequentially on the calling
/// thread; larger batches fan out to worker threads.
pub const BATCH_SEQUENTIAL_MAX: usize = 100;

/// Upper bound on worker threads for a parallel batch search.
pub const BATCH_MAX_WORKERS: usize = 32;

/// Default HTTP server port.
pub const DEFAULT_HTTP_PORT: u16 = 50052;

/// Default directory for persisted collections.
pub const DEFAULT_DATA_DIR: &str = "./data";
