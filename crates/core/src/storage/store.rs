//! The collection manager: named collections over one data directory.
//!
//! [`VectorStore`] multiplexes independent collections by name. Lifecycle
//! operations (create, delete, startup load) take the manager lock
//! exclusively; data-plane passthroughs take it shared just long enough to
//! clone out a [`Collection`] handle, then release it before touching the
//! collection's own lock, so data-plane traffic never serializes behind a
//! global write fence.

use crate::error::{Result, VectorError};
use crate::record::{CollectionConfig, CollectionStats, VectorRecord};
use crate::storage::collection::{Collection, SearchHit};
use crate::storage::persistence;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Thread-safe, cloneable manager of named collections.
#[derive(Debug, Clone)]
pub struct VectorStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    data_dir: PathBuf,
}

impl VectorStore {
    /// Opens a store over `data_dir`, creating the directory if needed and
    /// restoring every collection whose files load cleanly. A collection
    /// that fails to decode is dropped with a log line; the rest survive.
    ///
    /// The directory belongs to one running instance; concurrent writers
    /// from other processes produce undefined results.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let mut map = HashMap::new();
        for collection in persistence::load_all(&data_dir)? {
            let name = collection.data.read().config.name.clone();
            tracing::info!(collection = %name, "restored collection");
            map.insert(name, collection);
        }

        Ok(Self {
            collections: Arc::new(RwLock::new(map)),
            data_dir,
        })
    }

    /// The directory this store persists into.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Creates a collection and persists its config file. The collection is
    /// immediately usable; no warm-up happens.
    pub fn create_collection(&self, config: CollectionConfig) -> Result<()> {
        let mut collections = self.collections.write();
        if collections.contains_key(&config.name) {
            return Err(VectorError::AlreadyExists(config.name));
        }
        persistence::save_config(&self.data_dir, &config)?;
        let name = config.name.clone();
        tracing::info!(collection = %name, dimension = config.dimension, metric = config.metric.as_str(), "created collection");
        collections.insert(name, Collection::new(config));
        Ok(())
    }

    /// Drops a collection and its on-disk files. Returns whether it existed.
    pub fn delete_collection(&self, name: &str) -> bool {
        let mut collections = self.collections.write();
        let existed = collections.remove(name).is_some();
        if existed {
            persistence::remove_collection_files(&self.data_dir, name);
            tracing::info!(collection = %name, "deleted collection");
        }
        existed
    }

    /// Current collection names, in unspecified order.
    pub fn list_collections(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    /// Returns a handle to the named collection, if it exists.
    pub fn get_collection(&self, name: &str) -> Option<Collection> {
        self.collections.read().get(name).cloned()
    }

    fn collection(&self, name: &str) -> Result<Collection> {
        self.get_collection(name)
            .ok_or_else(|| VectorError::collection_not_found(name))
    }

    /// Stats for one collection.
    pub fn stats(&self, name: &str) -> Result<CollectionStats> {
        Ok(self.collection(name)?.stats())
    }

    /// Inserts into the named collection. See [`Collection::insert`].
    pub fn insert(
        &self,
        collection: &str,
        values: Vec<f32>,
        id: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Result<String> {
        self.collection(collection)?.insert(values, id, metadata)
    }

    /// Bulk insert; returns how many records were inserted.
    /// See [`Collection::batch_insert`].
    pub fn batch_insert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<usize> {
        Ok(self.collection(collection)?.batch_insert(records))
    }

    /// Removes a vector by id; `Ok(false)` if the id was absent.
    pub fn remove(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.collection(collection)?.remove(id))
    }

    /// Fetches a record by id.
    pub fn get(&self, collection: &str, id: &str) -> Result<Option<Arc<VectorRecord>>> {
        Ok(self.collection(collection)?.get(id))
    }

    /// Top-k search. See [`Collection::search`].
    pub fn search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
        ef: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        self.collection(collection)?.search(query, k, ef)
    }

    /// Batch search preserving input order. See [`Collection::batch_search`].
    pub fn batch_search(
        &self,
        collection: &str,
        queries: &[Vec<f32>],
        k: usize,
        ef: Option<usize>,
    ) -> Result<Vec<Vec<SearchHit>>> {
        self.collection(collection)?.batch_search(queries, k, ef)
    }

    /// Persists every collection and its config. Called on clean shutdown
    /// and on demand. Failures are logged per collection; the first error is
    /// returned after attempting the rest.
    pub fn save_all(&self) -> Result<()> {
        let collections = self.collections.read();
        let mut first_error = None;
        for (name, collection) in collections.iter() {
            let result = persistence::save_config(&self.data_dir, &collection.data.read().config)
                .and_then(|()| persistence::save_collection(&self.data_dir, collection));
            if let Err(e) = result {
                tracing::error!(collection = %name, error = %e, "failed to save collection");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Total estimated memory across all collections.
    pub fn total_memory_bytes(&self) -> usize {
        let collections = self.collections.read();
        collections.values().map(|c| c.memory_bytes()).sum()
    }

    /// Total live vectors across all collections.
    pub fn total_vectors(&self) -> usize {
        let collections = self.collections.read();
        collections.values().map(|c| c.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::DistanceMetric;
    use tempfile::TempDir;

    fn store() -> (VectorStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = VectorStore::open(tmp.path()).unwrap();
        (store, tmp)
    }

    fn euclidean_config(name: &str, dim: usize) -> CollectionConfig {
        CollectionConfig::new(name, dim).with_metric(DistanceMetric::Euclidean)
    }

    #[test]
    fn test_create_list_delete() {
        let (store, tmp) = store();
        store.create_collection(euclidean_config("a", 2)).unwrap();
        store.create_collection(euclidean_config("b", 4)).unwrap();

        let mut names = store.list_collections();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
        assert!(persistence::config_path(tmp.path(), "a").exists());

        assert!(store.delete_collection("a"));
        assert!(!store.delete_collection("a"));
        assert_eq!(store.list_collections(), vec!["b"]);
        assert!(!persistence::config_path(tmp.path(), "a").exists());
    }

    #[test]
    fn test_create_duplicate_fails() {
        let (store, _tmp) = store();
        store.create_collection(euclidean_config("a", 2)).unwrap();
        let err = store
            .create_collection(euclidean_config("a", 8))
            .unwrap_err();
        assert!(matches!(err, VectorError::AlreadyExists(_)));
        // The original collection is untouched.
        assert_eq!(store.stats("a").unwrap().dimension, 2);
    }

    #[test]
    fn test_unknown_collection_surfaces_not_found() {
        let (store, _tmp) = store();
        assert!(matches!(
            store.search("ghost", &[1.0], 5, None),
            Err(VectorError::NotFound(_))
        ));
        assert!(matches!(
            store.insert("ghost", vec![1.0], None, HashMap::new()),
            Err(VectorError::NotFound(_))
        ));
        assert!(matches!(
            store.stats("ghost"),
            Err(VectorError::NotFound(_))
        ));
        assert!(matches!(
            store.remove("ghost", "x"),
            Err(VectorError::NotFound(_))
        ));
    }

    #[test]
    fn test_passthrough_roundtrip() {
        let (store, _tmp) = store();
        store.create_collection(euclidean_config("vecs", 2)).unwrap();
        let id = store
            .insert("vecs", vec![1.0, 2.0], Some("v1".into()), HashMap::new())
            .unwrap();
        assert_eq!(id, "v1");
        assert_eq!(store.get("vecs", "v1").unwrap().unwrap().values, vec![1.0, 2.0]);

        let hits = store.search("vecs", &[1.0, 2.0], 1, None).unwrap();
        assert_eq!(hits[0].id, "v1");

        assert!(store.remove("vecs", "v1").unwrap());
        assert!(store.get("vecs", "v1").unwrap().is_none());
    }

    #[test]
    fn test_save_all_and_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = VectorStore::open(tmp.path()).unwrap();
            store.create_collection(euclidean_config("kept", 2)).unwrap();
            for i in 0..12 {
                store
                    .insert(
                        "kept",
                        vec![i as f32, 0.0],
                        Some(format!("id_{i}")),
                        HashMap::new(),
                    )
                    .unwrap();
            }
            store.save_all().unwrap();
        }

        let reopened = VectorStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.list_collections(), vec!["kept"]);
        assert_eq!(reopened.stats("kept").unwrap().vector_count, 12);
        let hits = reopened.search("kept", &[5.0, 0.0], 1, None).unwrap();
        assert_eq!(hits[0].id, "id_5");
    }

    #[test]
    fn test_unsaved_empty_collection_not_restored() {
        let tmp = TempDir::new().unwrap();
        {
            let store = VectorStore::open(tmp.path()).unwrap();
            store.create_collection(euclidean_config("cfg_only", 2)).unwrap();
            // No save_all: only the .cfg exists, which is a stray on reload.
        }
        let reopened = VectorStore::open(tmp.path()).unwrap();
        assert!(reopened.list_collections().is_empty());
    }

    #[test]
    fn test_totals() {
        let (store, _tmp) = store();
        store.create_collection(euclidean_config("a", 2)).unwrap();
        store.create_collection(euclidean_config("b", 2)).unwrap();
        store.insert("a", vec![0.0, 0.0], None, HashMap::new()).unwrap();
        store.insert("b", vec![1.0, 1.0], None, HashMap::new()).unwrap();
        store.insert("b", vec![2.0, 2.0], None, HashMap::new()).unwrap();
        assert_eq!(store.total_vectors(), 3);
        assert!(store.total_memory_bytes() > 0);
    }
}
