//! Core record and collection types.
//!
//! A [`VectorRecord`] is the caller-visible unit of storage: an external
//! string id, the float vector, and opaque string metadata that the index
//! never interprets. [`CollectionConfig`] is fixed at collection creation and
//! persisted alongside the index; [`CollectionStats`] is derived on demand.

use crate::config;
use crate::hnsw::distance::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stored vector with its external id and metadata.
///
/// The external id is chosen by the caller or synthesized by the index; once
/// assigned it is immutable for the life of the record. Metadata is echoed
/// back in responses and never interpreted by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Caller-visible identifier, unique within the collection.
    pub id: String,
    /// Vector values; length always equals the collection dimension.
    pub values: Vec<f32>,
    /// Opaque key-value payload.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl VectorRecord {
    /// Creates a record. An empty id means "let the index assign one".
    pub fn new(id: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            values,
            metadata: HashMap::new(),
        }
    }

    /// Creates a record with metadata attached.
    pub fn with_metadata(
        id: impl Into<String>,
        values: Vec<f32>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            values,
            metadata,
        }
    }
}

/// Immutable per-collection configuration, persisted as `<name>.cfg`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection name; also the on-disk file stem.
    pub name: String,
    /// Vector dimension enforced on every insert and query.
    pub dimension: usize,
    /// Distance metric; all scores are "smaller = more similar".
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Bidirectional links per node (the base layer uses `2 * m`).
    #[serde(default = "default_m")]
    pub m: usize,
    /// Candidate-list size during construction.
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,
    /// Candidate-list size during search.
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
    /// Maximum number of live vectors.
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,
}

fn default_m() -> usize {
    config::HNSW_DEFAULT_M
}
fn default_ef_construction() -> usize {
    config::HNSW_DEFAULT_EF_CONSTRUCTION
}
fn default_ef_search() -> usize {
    config::HNSW_DEFAULT_EF_SEARCH
}
fn default_max_elements() -> usize {
    config::DEFAULT_MAX_ELEMENTS
}

impl CollectionConfig {
    /// Configuration with default tuning for the given name and dimension.
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric: DistanceMetric::default(),
            m: default_m(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
            max_elements: default_max_elements(),
        }
    }

    /// Same configuration with a different metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

/// Point-in-time statistics for one collection, derived on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Number of live vectors.
    pub vector_count: usize,
    /// Estimated resident memory in bytes.
    pub memory_usage_bytes: usize,
    /// Configured dimension.
    pub dimension: usize,
    /// Metric name (`euclidean`, `cosine`, `dot_product`).
    pub metric: String,
}
