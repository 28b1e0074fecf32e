//! REST API layer: router assembly, handlers, models, and error mapping.

/// `ApiError` → HTTP status mapping.
pub mod errors;
/// Request handlers and `AppState`.
pub mod handlers;
/// JSON request/response types.
pub mod models;

use axum::routing::{delete, get, post};
use axum::Router;
use handlers::AppState;

/// Builds the full application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/save", post(handlers::save_all))
        .route(
            "/collections",
            post(handlers::create_collection).get(handlers::list_collections),
        )
        .route("/collections/:name", delete(handlers::delete_collection))
        .route("/collections/:name/stats", get(handlers::collection_stats))
        .route("/collections/:name/vectors", post(handlers::insert_vector))
        .route(
            "/collections/:name/vectors/batch",
            post(handlers::batch_insert_vectors),
        )
        .route(
            "/collections/:name/vectors/:id",
            get(handlers::get_vector)
                .delete(handlers::delete_vector)
                .put(handlers::update_vector),
        )
        .route("/collections/:name/search", post(handlers::search))
        .route("/collections/:name/search/batch", post(handlers::batch_search))
        .with_state(state)
}
