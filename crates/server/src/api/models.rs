//! Request and response data transfer objects for the REST API.
//!
//! All types derive `Serialize` and/or `Deserialize` for JSON marshalling
//! via axum.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vectord_core::SearchHit;

/// Request body for `POST /collections`.
#[derive(Debug, Deserialize)]
pub struct CreateCollectionRequest {
    pub name: String,
    pub dimension: usize,
    pub metric: Option<String>,
    pub m: Option<usize>,
    pub ef_construction: Option<usize>,
    pub ef_search: Option<usize>,
    pub max_elements: Option<usize>,
}

/// Response body for `POST /collections`, echoing the effective config.
#[derive(Debug, Serialize)]
pub struct CreateCollectionResponse {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub max_elements: usize,
}

/// One vector in insert and batch-insert requests.
#[derive(Debug, Deserialize)]
pub struct InsertVectorRequest {
    /// Omitted or empty: the collection synthesizes an id.
    pub id: Option<String>,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Response body for a single insert.
#[derive(Debug, Serialize)]
pub struct InsertResponse {
    pub id: String,
}

/// Request body for `POST /collections/:name/vectors/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchInsertRequest {
    pub vectors: Vec<InsertVectorRequest>,
}

/// Response body for a batch insert.
#[derive(Debug, Serialize)]
pub struct BatchInsertResponse {
    /// Records actually inserted; failed records are skipped, not fatal.
    pub inserted: usize,
}

/// Request body for `PUT /collections/:name/vectors/:id`.
#[derive(Debug, Deserialize)]
pub struct UpdateVectorRequest {
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Request body for `POST /collections/:name/search`.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub values: Vec<f32>,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Widens the configured `ef_search` when larger; never narrows it.
    pub ef: Option<usize>,
}

/// Request body for `POST /collections/:name/search/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchSearchRequest {
    pub queries: Vec<Vec<f32>>,
    #[serde(default = "default_k")]
    pub k: usize,
    pub ef: Option<usize>,
}

fn default_k() -> usize {
    10
}

/// One search result. `score` is the raw metric value: smaller = closer.
#[derive(Debug, Serialize)]
pub struct SearchHitResponse {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, String>,
}

impl From<SearchHit> for SearchHitResponse {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            score: hit.score,
            metadata: hit.record.metadata.clone(),
        }
    }
}

/// Response body for `POST /collections/:name/search`.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHitResponse>,
    pub count: usize,
}

/// Response body for `POST /collections/:name/search/batch`; outer order
/// matches the request's query order.
#[derive(Debug, Serialize)]
pub struct BatchSearchResponse {
    pub results: Vec<Vec<SearchHitResponse>>,
}

/// Response body for vector retrieval.
#[derive(Debug, Serialize)]
pub struct VectorResponse {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: HashMap<String, String>,
}

/// Summary entry in `GET /collections`.
#[derive(Debug, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub vector_count: usize,
    pub dimension: usize,
    pub metric: String,
}

/// Generic success message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub collections_count: usize,
    pub total_vectors: usize,
    pub memory_used_bytes: usize,
}
