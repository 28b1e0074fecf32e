//! Collections: one HNSW graph plus the record store and id maps.
//!
//! [`CollectionData`] is the inner state guarded by a `RwLock`;
//! [`Collection`] is a cloneable handle. Searches, gets, and batch searches
//! take shared access; inserts, removals, and batch inserts take exclusive
//! access. External ids map to monotonic `u64` internal keys that are never
//! reused within the life of an index; keys map to dense graph slots.

use crate::config;
use crate::error::{Result, VectorError};
use crate::hnsw::distance::normalize_in_place;
use crate::hnsw::graph::HnswGraph;
use crate::hnsw::search::knn_search;
use crate::hnsw::DistanceMetric;
use crate::record::{CollectionConfig, CollectionStats, VectorRecord};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// One search result: external id, raw metric score (smaller = closer), and
/// an owned handle to the matching record.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// External id of the matched vector.
    pub id: String,
    /// Raw distance-functor value.
    pub score: f32,
    /// The matched record.
    pub record: Arc<VectorRecord>,
}

/// Inner collection state, protected by the handle's `RwLock`.
#[derive(Debug)]
pub struct CollectionData {
    /// Immutable configuration.
    pub config: CollectionConfig,
    /// The proximity graph over dense slots.
    pub graph: HnswGraph,
    /// Payload store: internal key → record.
    pub records: HashMap<u64, Arc<VectorRecord>>,
    /// Injective external id → internal key map.
    pub id_to_key: HashMap<String, u64>,
    /// Internal key → graph slot, live keys only.
    pub key_to_slot: HashMap<u64, u32>,
    /// Graph slot → internal key, every slot ever assigned.
    pub slot_to_key: Vec<u64>,
    /// Monotonic key generator; resumes from the persisted high-water mark.
    pub next_key: u64,
}

impl CollectionData {
    /// Creates empty collection state.
    pub fn new(config: CollectionConfig) -> Self {
        let graph = HnswGraph::new(&config);
        Self {
            config,
            graph,
            records: HashMap::new(),
            id_to_key: HashMap::new(),
            key_to_slot: HashMap::new(),
            slot_to_key: Vec::new(),
            next_key: 0,
        }
    }

    /// Synthesizes an external id: microseconds since epoch in hex, paired
    /// with the next internal key so ids stay unique across tick collisions.
    fn generate_id(&self) -> String {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros())
            .unwrap_or(0);
        format!("{micros:x}-{}", self.next_key)
    }

    /// Inserts a record. `id: None` (or an empty string upstream) asks the
    /// collection to synthesize one.
    pub fn insert_record(
        &mut self,
        values: Vec<f32>,
        id: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Result<String> {
        if values.len() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                got: values.len(),
            });
        }
        if self.records.len() >= self.config.max_elements {
            return Err(VectorError::CapacityExceeded {
                max: self.config.max_elements,
            });
        }

        let id = id.unwrap_or_else(|| self.generate_id());
        if self.id_to_key.contains_key(&id) {
            return Err(VectorError::DuplicateId(id));
        }

        let key = self.next_key;
        self.next_key += 1;

        let slot = if self.config.metric == DistanceMetric::Cosine {
            let mut normalized = values.clone();
            normalize_in_place(&mut normalized);
            self.graph.insert(&normalized)
        } else {
            self.graph.insert(&values)
        };
        debug_assert_eq!(slot as usize, self.slot_to_key.len());

        self.slot_to_key.push(key);
        self.key_to_slot.insert(key, slot);
        self.id_to_key.insert(id.clone(), key);
        self.records.insert(
            key,
            Arc::new(VectorRecord {
                id: id.clone(),
                values,
                metadata,
            }),
        );
        Ok(id)
    }

    /// Removes a record by external id. The graph slot is tombstoned, not
    /// excised; its edges stay readable for in-flight searches.
    pub fn remove_record(&mut self, id: &str) -> bool {
        let Some(key) = self.id_to_key.remove(id) else {
            return false;
        };
        if let Some(slot) = self.key_to_slot.remove(&key) {
            self.graph.mark_deleted(slot);
        }
        self.records.remove(&key);
        true
    }

    /// KNN search with effective breadth `max(ef_override, ef_search, k)`.
    /// The query's dimension must already be validated.
    pub(crate) fn search_validated(
        &self,
        query: &[f32],
        k: usize,
        ef: Option<usize>,
    ) -> Vec<SearchHit> {
        let ef = ef.unwrap_or(0).max(self.config.ef_search).max(k);
        knn_search(&self.graph, query, k, ef)
            .into_iter()
            .filter_map(|(score, slot)| {
                let key = *self.slot_to_key.get(slot as usize)?;
                let record = self.records.get(&key)?;
                Some(SearchHit {
                    id: record.id.clone(),
                    score,
                    record: Arc::clone(record),
                })
            })
            .collect()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no live records remain.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Estimated resident memory, in bytes.
    pub fn memory_bytes(&self) -> usize {
        let mut total = 0usize;

        total += self.graph.vectors.len() * 4;
        total += self.graph.layers.len() + self.graph.deleted.len();
        for node in &self.graph.neighbors {
            for layer in node {
                total += layer.len() * 4 + 24;
            }
            total += 24;
        }

        for record in self.records.values() {
            total += record.id.len() + record.values.len() * 4 + 64;
            for (k, v) in &record.metadata {
                total += k.len() + v.len() + 16;
            }
        }

        total += self.id_to_key.len() * 40;
        total += self.key_to_slot.len() * 24;
        total += self.slot_to_key.len() * 8;
        total
    }

    /// Point-in-time stats.
    pub fn stats(&self) -> CollectionStats {
        CollectionStats {
            vector_count: self.len(),
            memory_usage_bytes: self.memory_bytes(),
            dimension: self.config.dimension,
            metric: self.config.metric.as_str().to_string(),
        }
    }

    /// Validates internal invariants after deserialization: parallel array
    /// lengths, map symmetry, key high-water mark, and graph bounds.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let slots = self.graph.slot_count();
        let dim = self.config.dimension;

        if self.graph.dimension != dim {
            return Err(format!(
                "graph dimension {} != collection dimension {}",
                self.graph.dimension, dim
            ));
        }
        if self.graph.vectors.len() != slots * dim {
            return Err(format!(
                "vector arena length {} != slots({slots}) * dimension({dim})",
                self.graph.vectors.len()
            ));
        }
        if self.graph.neighbors.len() != slots || self.graph.deleted.len() != slots {
            return Err(format!(
                "graph arrays inconsistent: neighbors={}, deleted={}, slots={slots}",
                self.graph.neighbors.len(),
                self.graph.deleted.len()
            ));
        }
        if self.slot_to_key.len() != slots {
            return Err(format!(
                "slot_to_key length {} != slots {slots}",
                self.slot_to_key.len()
            ));
        }

        let live = self.graph.live_count();
        if self.records.len() != live
            || self.id_to_key.len() != live
            || self.key_to_slot.len() != live
        {
            return Err(format!(
                "map sizes diverge: records={}, ids={}, key_to_slot={}, live slots={live}",
                self.records.len(),
                self.id_to_key.len(),
                self.key_to_slot.len()
            ));
        }

        for (slot, &key) in self.slot_to_key.iter().enumerate() {
            if key >= self.next_key {
                return Err(format!("key {key} >= next_key {}", self.next_key));
            }
            if !self.graph.is_deleted(slot as u32) {
                let Some(record) = self.records.get(&key) else {
                    return Err(format!("live slot {slot} (key {key}) has no record"));
                };
                if record.values.len() != dim {
                    return Err(format!(
                        "record '{}' has {} values, expected {dim}",
                        record.id,
                        record.values.len()
                    ));
                }
                if self.id_to_key.get(&record.id) != Some(&key) {
                    return Err(format!("id map does not point back to key {key}"));
                }
                if self.key_to_slot.get(&key) != Some(&(slot as u32)) {
                    return Err(format!("key {key} does not map back to slot {slot}"));
                }
            }
        }

        if let Some(ep) = self.graph.entry_point {
            if ep as usize >= slots {
                return Err(format!("entry point {ep} out of bounds ({slots} slots)"));
            }
        } else if slots > 0 {
            return Err("non-empty graph has no entry point".to_string());
        }

        for (slot, node) in self.graph.neighbors.iter().enumerate() {
            for (layer, links) in node.iter().enumerate() {
                for &peer in links {
                    if peer as usize >= slots {
                        return Err(format!(
                            "neighbor {peer} out of bounds at slot {slot} layer {layer}"
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

/// A thread-safe, cloneable collection handle.
///
/// All operations acquire either shared or exclusive access to the inner
/// [`CollectionData`]; cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct Collection {
    /// Shared inner state.
    pub data: Arc<RwLock<CollectionData>>,
}

impl Collection {
    /// Creates an empty collection.
    pub fn new(config: CollectionConfig) -> Self {
        Self::from_data(CollectionData::new(config))
    }

    /// Wraps already-built state (used by the persistence loader).
    pub fn from_data(data: CollectionData) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Inserts a vector, returning the assigned external id.
    pub fn insert(
        &self,
        values: Vec<f32>,
        id: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Result<String> {
        self.data.write().insert_record(values, id, metadata)
    }

    /// Inserts a batch under a single write lock. Per-record failures are
    /// swallowed and logged; the return value is how many records made it in.
    pub fn batch_insert(&self, records: Vec<VectorRecord>) -> usize {
        let mut data = self.data.write();
        let mut inserted = 0;
        for record in records {
            let id = if record.id.is_empty() {
                None
            } else {
                Some(record.id)
            };
            match data.insert_record(record.values, id, record.metadata) {
                Ok(_) => inserted += 1,
                Err(e) => tracing::debug!(error = %e, "batch insert skipped a record"),
            }
        }
        inserted
    }

    /// Removes a vector by external id. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.data.write().remove_record(id)
    }

    /// Fetches a record by external id.
    pub fn get(&self, id: &str) -> Option<Arc<VectorRecord>> {
        let data = self.data.read();
        let key = data.id_to_key.get(id)?;
        data.records.get(key).cloned()
    }

    /// Top-k similarity search. `ef` overrides the configured `ef_search`
    /// only when larger; the effective breadth is always at least `k`.
    /// Results are sorted by ascending score, at most `min(k, len)` of them.
    ///
    /// For cosine collections the stored side is normalized at insert;
    /// normalizing the query is the caller's responsibility.
    pub fn search(&self, query: &[f32], k: usize, ef: Option<usize>) -> Result<Vec<SearchHit>> {
        let data = self.data.read();
        if query.len() != data.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: data.config.dimension,
                got: query.len(),
            });
        }
        Ok(data.search_validated(query, k, ef))
    }

    /// Runs many searches, preserving input order in the output.
    ///
    /// Small batches run sequentially. Batches above
    /// [`config::BATCH_SEQUENTIAL_MAX`] fan out over disjoint ranges of the
    /// output to scoped worker threads, all under the one read lock taken
    /// here; workers are joined before returning, so partial results never
    /// escape. Every query's dimension is validated before any search runs.
    pub fn batch_search(
        &self,
        queries: &[Vec<f32>],
        k: usize,
        ef: Option<usize>,
    ) -> Result<Vec<Vec<SearchHit>>> {
        let data = self.data.read();
        for query in queries {
            if query.len() != data.config.dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: data.config.dimension,
                    got: query.len(),
                });
            }
        }

        if queries.len() <= config::BATCH_SEQUENTIAL_MAX {
            return Ok(queries
                .iter()
                .map(|q| data.search_validated(q, k, ef))
                .collect());
        }

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(queries.len() / config::BATCH_SEQUENTIAL_MAX)
            .min(config::BATCH_MAX_WORKERS)
            .max(1);
        let chunk = queries.len().div_ceil(workers);

        let mut results: Vec<Vec<SearchHit>> = Vec::with_capacity(queries.len());
        results.resize_with(queries.len(), Vec::new);

        let shared: &CollectionData = &data;
        std::thread::scope(|scope| {
            for (query_chunk, out_chunk) in queries.chunks(chunk).zip(results.chunks_mut(chunk)) {
                scope.spawn(move || {
                    for (query, out) in query_chunk.iter().zip(out_chunk.iter_mut()) {
                        *out = shared.search_validated(query, k, ef);
                    }
                });
            }
        });

        Ok(results)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if the collection holds no live records.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Point-in-time stats (shared access).
    pub fn stats(&self) -> CollectionStats {
        self.data.read().stats()
    }

    /// Estimated resident memory, in bytes (shared access).
    pub fn memory_bytes(&self) -> usize {
        self.data.read().memory_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::DistanceMetric;

    fn euclidean_collection(dim: usize) -> Collection {
        Collection::new(CollectionConfig::new("t", dim).with_metric(DistanceMetric::Euclidean))
    }

    #[test]
    fn test_insert_then_get() {
        let col = euclidean_collection(3);
        let mut meta = HashMap::new();
        meta.insert("lang".to_string(), "en".to_string());
        let id = col
            .insert(vec![1.0, 2.0, 3.0], Some("doc-1".into()), meta.clone())
            .unwrap();
        assert_eq!(id, "doc-1");

        let rec = col.get("doc-1").expect("record must exist");
        assert_eq!(rec.values, vec![1.0, 2.0, 3.0]);
        assert_eq!(rec.metadata, meta);
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn test_generated_id_format() {
        let col = euclidean_collection(2);
        let id = col.insert(vec![0.0, 1.0], None, HashMap::new()).unwrap();
        let (hex_part, key_part) = id.split_once('-').expect("id has hex-key shape");
        assert!(u128::from_str_radix(hex_part, 16).is_ok());
        assert_eq!(key_part, "0");
        let id2 = col.insert(vec![1.0, 0.0], None, HashMap::new()).unwrap();
        assert!(id2.ends_with("-1"));
    }

    #[test]
    fn test_duplicate_id_rejected_first_record_intact() {
        let col = euclidean_collection(2);
        col.insert(vec![1.0, 0.0], Some("x".into()), HashMap::new())
            .unwrap();
        let err = col
            .insert(vec![0.0, 1.0], Some("x".into()), HashMap::new())
            .unwrap_err();
        assert!(matches!(err, VectorError::DuplicateId(_)));
        assert_eq!(col.get("x").unwrap().values, vec![1.0, 0.0]);
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn test_dimension_mismatch() {
        let col = euclidean_collection(3);
        let err = col
            .insert(vec![1.0, 2.0], None, HashMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            VectorError::DimensionMismatch {
                expected: 3,
                got: 2
            }
        ));
        let err = col.search(&[1.0], 5, None).unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut cfg = CollectionConfig::new("t", 1).with_metric(DistanceMetric::Euclidean);
        cfg.max_elements = 2;
        let col = Collection::new(cfg);
        col.insert(vec![0.0], None, HashMap::new()).unwrap();
        col.insert(vec![1.0], None, HashMap::new()).unwrap();
        let err = col.insert(vec![2.0], None, HashMap::new()).unwrap_err();
        assert!(matches!(err, VectorError::CapacityExceeded { max: 2 }));
        // Removing frees capacity even before the slot is collected.
        assert!(col.remove(&col.get_any_id()));
        assert!(col.insert(vec![3.0], None, HashMap::new()).is_ok());
    }

    impl Collection {
        fn get_any_id(&self) -> String {
            self.data
                .read()
                .records
                .values()
                .next()
                .expect("non-empty")
                .id
                .clone()
        }
    }

    #[test]
    fn test_remove_semantics() {
        let col = euclidean_collection(2);
        for i in 0..10 {
            col.insert(
                vec![i as f32, 0.0],
                Some(format!("id_{i}")),
                HashMap::new(),
            )
            .unwrap();
        }
        assert!(col.remove("id_4"));
        assert!(!col.remove("id_4"));
        assert_eq!(col.len(), 9);
        assert!(col.get("id_4").is_none());

        let hits = col.search(&[4.0, 0.0], 10, None).unwrap();
        assert!(hits.iter().all(|h| h.id != "id_4"));
        assert_eq!(hits.len(), 9);
    }

    #[test]
    fn test_insert_after_deleting_everything_stays_searchable() {
        let col = euclidean_collection(2);
        for i in 0..5 {
            col.insert(vec![i as f32, 0.0], Some(format!("old_{i}")), HashMap::new())
                .unwrap();
        }
        for i in 0..5 {
            assert!(col.remove(&format!("old_{i}")));
        }
        assert_eq!(col.len(), 0);

        // New nodes must link through the tombstones and stay reachable.
        col.insert(vec![100.0, 0.0], Some("new".into()), HashMap::new())
            .unwrap();
        let hits = col.search(&[100.0, 0.0], 3, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "new");
    }

    #[test]
    fn test_search_sorted_and_bounded() {
        let col = euclidean_collection(1);
        for i in 0..50 {
            col.insert(vec![i as f32], Some(format!("id_{i}")), HashMap::new())
                .unwrap();
        }
        let hits = col.search(&[20.0], 5, None).unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].id, "id_20");
        assert!(hits[0].score.abs() < 1e-6);
        for pair in hits.windows(2) {
            assert!(pair[0].score <= pair[1].score);
        }
    }

    #[test]
    fn test_ef_override_only_widens() {
        let mut cfg = CollectionConfig::new("t", 1).with_metric(DistanceMetric::Euclidean);
        cfg.ef_search = 50;
        let col = Collection::new(cfg);
        for i in 0..200 {
            col.insert(vec![i as f32], None, HashMap::new()).unwrap();
        }
        // An override below ef_search is ignored; results match the default.
        let narrow = col.search(&[77.0], 10, Some(2)).unwrap();
        let default = col.search(&[77.0], 10, None).unwrap();
        let ids = |hits: &[SearchHit]| hits.iter().map(|h| h.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&narrow), ids(&default));
    }

    #[test]
    fn test_cosine_self_query_near_zero() {
        let col = Collection::new(CollectionConfig::new("t", 4));
        col.insert(vec![3.0, 0.0, 0.0, 0.0], Some("a".into()), HashMap::new())
            .unwrap();
        // Unnormalized query against the normalized stored vector.
        let hits = col.search(&[3.0, 0.0, 0.0, 0.0], 1, None).unwrap();
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].score <= 1e-5);
        // The stored record keeps its raw values.
        assert_eq!(col.get("a").unwrap().values, vec![3.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_batch_insert_counts_and_swallows() {
        let col = euclidean_collection(2);
        col.insert(vec![9.0, 9.0], Some("taken".into()), HashMap::new())
            .unwrap();
        let records = vec![
            VectorRecord::new("a", vec![1.0, 0.0]),
            VectorRecord::new("taken", vec![0.0, 1.0]), // duplicate: skipped
            VectorRecord::new("", vec![0.5, 0.5]),      // empty id: synthesized
            VectorRecord::new("bad", vec![1.0]),        // wrong dim: skipped
        ];
        let inserted = col.batch_insert(records);
        assert_eq!(inserted, 2);
        assert_eq!(col.len(), 3);
        assert_eq!(col.get("taken").unwrap().values, vec![9.0, 9.0]);
    }

    #[test]
    fn test_batch_search_matches_single_sequential() {
        let col = euclidean_collection(2);
        for i in 0..40 {
            col.insert(
                vec![i as f32, (40 - i) as f32],
                Some(format!("id_{i}")),
                HashMap::new(),
            )
            .unwrap();
        }
        let queries: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32, 1.0]).collect();
        let batched = col.batch_search(&queries, 5, None).unwrap();
        assert_eq!(batched.len(), queries.len());
        for (i, query) in queries.iter().enumerate() {
            let single = col.search(query, 5, None).unwrap();
            let batch_ids: Vec<&str> = batched[i].iter().map(|h| h.id.as_str()).collect();
            let single_ids: Vec<&str> = single.iter().map(|h| h.id.as_str()).collect();
            assert_eq!(batch_ids, single_ids, "query {i} diverged");
        }
    }

    #[test]
    fn test_batch_search_parallel_path_preserves_order() {
        let col = euclidean_collection(2);
        for i in 0..60 {
            col.insert(
                vec![(i % 8) as f32, (i / 8) as f32],
                Some(format!("id_{i}")),
                HashMap::new(),
            )
            .unwrap();
        }
        // Above BATCH_SEQUENTIAL_MAX, so the scoped-thread path runs.
        let queries: Vec<Vec<f32>> = (0..150)
            .map(|i| vec![(i % 8) as f32, (i % 7) as f32])
            .collect();
        let batched = col.batch_search(&queries, 3, None).unwrap();
        assert_eq!(batched.len(), 150);
        for (i, query) in queries.iter().enumerate() {
            let single = col.search(query, 3, None).unwrap();
            let batch_ids: Vec<&str> = batched[i].iter().map(|h| h.id.as_str()).collect();
            let single_ids: Vec<&str> = single.iter().map(|h| h.id.as_str()).collect();
            assert_eq!(batch_ids, single_ids, "query {i} diverged");
        }
    }

    #[test]
    fn test_batch_search_rejects_any_bad_dimension() {
        let col = euclidean_collection(2);
        col.insert(vec![0.0, 0.0], None, HashMap::new()).unwrap();
        let queries = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            col.batch_search(&queries, 3, None),
            Err(VectorError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_stats() {
        let col = euclidean_collection(4);
        col.insert(vec![1.0; 4], None, HashMap::new()).unwrap();
        let stats = col.stats();
        assert_eq!(stats.vector_count, 1);
        assert_eq!(stats.dimension, 4);
        assert_eq!(stats.metric, "euclidean");
        assert!(stats.memory_usage_bytes > 0);
    }

    #[test]
    fn test_validate_fresh_state() {
        let col = euclidean_collection(2);
        for i in 0..20 {
            col.insert(vec![i as f32, 0.0], None, HashMap::new())
                .unwrap();
        }
        col.remove(&col.get_any_id());
        assert!(col.data.read().validate().is_ok());
    }
}
