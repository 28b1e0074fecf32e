//! Storage layer: collections, the collection manager, and disk persistence.

/// Collection state, the cloneable handle, and search results.
pub mod collection;
/// `.cfg` / `.idx` / `.idx.meta` save and load.
pub mod persistence;
/// The named-collection manager.
pub mod store;

pub use collection::{Collection, CollectionData, SearchHit};
pub use persistence::{load_collection, save_collection};
pub use store::VectorStore;
