//! HTTP request handlers and shared application state.

use crate::api::errors::ApiError;
use crate::api::models::*;
use axum::extract::{Path, State};
use axum::Json;
use std::time::Instant;
use vectord_core::{
    config, CollectionConfig, CollectionStats, DistanceMetric, VectorRecord, VectorStore,
};

/// Shared application state passed to every handler via axum's `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: VectorStore,
    pub start_time: Instant,
}

fn validate_collection_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.len() > config::MAX_COLLECTION_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "collection name must be 1-{} characters",
            config::MAX_COLLECTION_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::BadRequest(
            "collection name must contain only alphanumeric characters, '_', or '-'".into(),
        ));
    }
    Ok(())
}

fn validate_values(values: &[f32]) -> Result<(), ApiError> {
    if values.iter().any(|v| v.is_nan() || v.is_infinite()) {
        return Err(ApiError::BadRequest("values contain NaN or Inf".into()));
    }
    Ok(())
}

fn validate_k(k: usize) -> Result<(), ApiError> {
    if k == 0 || k > config::MAX_K {
        return Err(ApiError::BadRequest(format!(
            "k must be 1-{}",
            config::MAX_K
        )));
    }
    Ok(())
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        collections_count: state.store.list_collections().len(),
        total_vectors: state.store.total_vectors(),
        memory_used_bytes: state.store.total_memory_bytes(),
    })
}

/// `POST /collections`
pub async fn create_collection(
    State(state): State<AppState>,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<Json<CreateCollectionResponse>, ApiError> {
    validate_collection_name(&req.name)?;
    if req.dimension == 0 || req.dimension > config::MAX_DIMENSION {
        return Err(ApiError::BadRequest(format!(
            "dimension must be 1-{}",
            config::MAX_DIMENSION
        )));
    }

    let mut cfg = CollectionConfig::new(req.name, req.dimension);
    if let Some(metric) = &req.metric {
        cfg.metric = DistanceMetric::parse(metric).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "unknown metric '{metric}' (expected euclidean, cosine, or dot_product)"
            ))
        })?;
    }
    if let Some(m) = req.m {
        if !(4..=128).contains(&m) {
            return Err(ApiError::BadRequest("m must be 4-128".into()));
        }
        cfg.m = m;
    }
    if let Some(ef) = req.ef_construction {
        if !(10..=2000).contains(&ef) {
            return Err(ApiError::BadRequest("ef_construction must be 10-2000".into()));
        }
        cfg.ef_construction = ef;
    }
    if let Some(ef) = req.ef_search {
        if !(10..=2000).contains(&ef) {
            return Err(ApiError::BadRequest("ef_search must be 10-2000".into()));
        }
        cfg.ef_search = ef;
    }
    if let Some(max) = req.max_elements {
        if max == 0 {
            return Err(ApiError::BadRequest("max_elements must be positive".into()));
        }
        cfg.max_elements = max;
    }

    let response = CreateCollectionResponse {
        name: cfg.name.clone(),
        dimension: cfg.dimension,
        metric: cfg.metric.as_str().to_string(),
        m: cfg.m,
        ef_construction: cfg.ef_construction,
        ef_search: cfg.ef_search,
        max_elements: cfg.max_elements,
    };
    state.store.create_collection(cfg)?;
    Ok(Json(response))
}

/// `GET /collections`
pub async fn list_collections(State(state): State<AppState>) -> Json<Vec<CollectionInfo>> {
    let mut infos = Vec::new();
    for name in state.store.list_collections() {
        // A collection may vanish between list and stats; skip it quietly.
        if let Ok(stats) = state.store.stats(&name) {
            infos.push(CollectionInfo {
                name,
                vector_count: stats.vector_count,
                dimension: stats.dimension,
                metric: stats.metric,
            });
        }
    }
    Json(infos)
}

/// `DELETE /collections/:name`
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if state.store.delete_collection(&name) {
        Ok(Json(MessageResponse {
            message: format!("collection '{name}' deleted"),
        }))
    } else {
        Err(ApiError::NotFound(format!("collection '{name}' not found")))
    }
}

/// `GET /collections/:name/stats`
pub async fn collection_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CollectionStats>, ApiError> {
    Ok(Json(state.store.stats(&name)?))
}

/// `POST /collections/:name/vectors`
pub async fn insert_vector(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<InsertVectorRequest>,
) -> Result<Json<InsertResponse>, ApiError> {
    validate_values(&req.values)?;
    let id = req.id.filter(|id| !id.is_empty());
    let assigned = state.store.insert(&name, req.values, id, req.metadata)?;
    tracing::info!(collection = %name, id = %assigned, "vector inserted");
    Ok(Json(InsertResponse { id: assigned }))
}

/// `POST /collections/:name/vectors/batch`
pub async fn batch_insert_vectors(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<BatchInsertRequest>,
) -> Result<Json<BatchInsertResponse>, ApiError> {
    if req.vectors.is_empty() {
        return Err(ApiError::BadRequest("batch must not be empty".into()));
    }
    if req.vectors.len() > config::MAX_BATCH_SIZE {
        return Err(ApiError::BadRequest(format!(
            "batch size exceeds maximum of {}",
            config::MAX_BATCH_SIZE
        )));
    }
    for (i, vector) in req.vectors.iter().enumerate() {
        validate_values(&vector.values)
            .map_err(|_| ApiError::BadRequest(format!("vector {i}: values contain NaN or Inf")))?;
    }

    let records: Vec<VectorRecord> = req
        .vectors
        .into_iter()
        .map(|v| VectorRecord {
            id: v.id.unwrap_or_default(),
            values: v.values,
            metadata: v.metadata,
        })
        .collect();

    let inserted = state.store.batch_insert(&name, records)?;
    tracing::info!(collection = %name, inserted, "batch inserted");
    Ok(Json(BatchInsertResponse { inserted }))
}

/// `GET /collections/:name/vectors/:id`
pub async fn get_vector(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<VectorResponse>, ApiError> {
    let record = state
        .store
        .get(&name, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("vector '{id}' not found")))?;
    Ok(Json(VectorResponse {
        id: record.id.clone(),
        values: record.values.clone(),
        metadata: record.metadata.clone(),
    }))
}

/// `DELETE /collections/:name/vectors/:id`
pub async fn delete_vector(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    if state.store.remove(&name, &id)? {
        tracing::info!(collection = %name, id = %id, "vector deleted");
        Ok(Json(MessageResponse {
            message: format!("vector '{id}' deleted"),
        }))
    } else {
        Err(ApiError::NotFound(format!("vector '{id}' not found")))
    }
}

/// `PUT /collections/:name/vectors/:id`
///
/// Update is delete-then-insert: the record gets a fresh internal key. The
/// two steps are not atomic; if the re-insert fails (say, on a dimension
/// mismatch) the record stays deleted.
pub async fn update_vector(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    Json(req): Json<UpdateVectorRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_values(&req.values)?;
    if !state.store.remove(&name, &id)? {
        return Err(ApiError::NotFound(format!("vector '{id}' not found")));
    }
    state
        .store
        .insert(&name, req.values, Some(id.clone()), req.metadata)?;
    tracing::info!(collection = %name, id = %id, "vector updated");
    Ok(Json(MessageResponse {
        message: format!("vector '{id}' updated"),
    }))
}

/// `POST /collections/:name/search`
pub async fn search(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    validate_k(req.k)?;
    validate_values(&req.values)?;
    let hits = state.store.search(&name, &req.values, req.k, req.ef)?;
    let results: Vec<SearchHitResponse> = hits.into_iter().map(Into::into).collect();
    let count = results.len();
    Ok(Json(SearchResponse { results, count }))
}

/// `POST /collections/:name/search/batch`
pub async fn batch_search(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<BatchSearchRequest>,
) -> Result<Json<BatchSearchResponse>, ApiError> {
    validate_k(req.k)?;
    if req.queries.is_empty() {
        return Err(ApiError::BadRequest("queries must not be empty".into()));
    }
    if req.queries.len() > config::MAX_BATCH_SIZE {
        return Err(ApiError::BadRequest(format!(
            "batch size exceeds maximum of {}",
            config::MAX_BATCH_SIZE
        )));
    }
    for (i, query) in req.queries.iter().enumerate() {
        validate_values(query)
            .map_err(|_| ApiError::BadRequest(format!("query {i}: values contain NaN or Inf")))?;
    }

    let store = state.store.clone();
    let name_owned = name.clone();
    // The parallel fan-out blocks on worker threads; keep it off the runtime.
    let per_query = tokio::task::spawn_blocking(move || {
        store.batch_search(&name_owned, &req.queries, req.k, req.ef)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("batch search task failed: {e}")))??;

    let results: Vec<Vec<SearchHitResponse>> = per_query
        .into_iter()
        .map(|hits| hits.into_iter().map(Into::into).collect())
        .collect();
    Ok(Json(BatchSearchResponse { results }))
}

/// `POST /save`
pub async fn save_all(
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.save_all()?;
    Ok(Json(MessageResponse {
        message: "all collections saved".to_string(),
    }))
}
