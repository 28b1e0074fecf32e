//! # vectord-server
//!
//! HTTP front-end for the vectord engine.
//!
//! Provides the JSON REST API over [`vectord_core::VectorStore`]. The engine
//! itself lives in `vectord-core`.

/// REST API layer: router, handlers, models, and error mapping.
pub mod api;
