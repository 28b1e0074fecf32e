//! HNSW graph structure.
//!
//! [`HnswGraph`] stores the multilayer proximity graph in a Struct-of-Arrays
//! layout: one contiguous f32 arena for vectors, with parallel arrays for
//! neighbor lists, layer assignments, and tombstone flags. Nodes are dense
//! `u32` slots assigned in insertion order; the collection layer maps its
//! sparse monotonic keys onto slots.
//!
//! Removal only sets a tombstone flag: edges stay in place so in-flight
//! traversals keep working, and searches skip tombstoned slots when
//! collecting results. Tombstoned slots are physically collected when a
//! snapshot containing them is reloaded.

use crate::config;
use crate::hnsw::distance::DistanceMetric;
use crate::record::CollectionConfig;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

fn level_rng() -> SmallRng {
    SmallRng::from_entropy()
}

/// Multilayer proximity graph over dense vector slots.
#[derive(Debug, Serialize, Deserialize)]
pub struct HnswGraph {
    /// Links per node above the base layer.
    pub m: usize,
    /// Links per node at the base layer (`2 * m`).
    pub m_max0: usize,
    /// Candidate-list size used while building.
    pub ef_construction: usize,
    /// Vector dimension.
    pub dimension: usize,
    /// Distance metric shared with the owning collection.
    pub metric: DistanceMetric,
    /// Contiguous vector arena: slot `s` occupies `[s*dim, (s+1)*dim)`.
    pub vectors: Vec<f32>,
    /// Neighbor lists: `neighbors[slot][layer]` holds peer slots.
    pub neighbors: Vec<Vec<Vec<u32>>>,
    /// Layer assignment per slot.
    pub layers: Vec<u8>,
    /// Tombstone flags per slot.
    pub deleted: Vec<bool>,
    /// Root slot of every descent, or `None` while empty.
    pub entry_point: Option<u32>,
    /// Highest populated layer.
    pub max_layer: usize,
    #[serde(skip, default = "level_rng")]
    rng: SmallRng,
}

impl HnswGraph {
    /// Creates an empty graph with the collection's tuning parameters.
    pub fn new(cfg: &CollectionConfig) -> Self {
        Self {
            m: cfg.m,
            m_max0: cfg.m * 2,
            ef_construction: cfg.ef_construction,
            dimension: cfg.dimension,
            metric: cfg.metric,
            vectors: Vec::new(),
            neighbors: Vec::new(),
            layers: Vec::new(),
            deleted: Vec::new(),
            entry_point: None,
            max_layer: 0,
            rng: level_rng(),
        }
    }

    /// Same as [`HnswGraph::new`] but with a fixed RNG seed, so layer draws
    /// (and therefore the graph shape) are reproducible in tests.
    pub fn with_seed(cfg: &CollectionConfig, seed: u64) -> Self {
        let mut graph = Self::new(cfg);
        graph.rng = SmallRng::seed_from_u64(seed);
        graph
    }

    /// Total slots, including tombstoned ones.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.layers.len()
    }

    /// Number of live (non-tombstoned) slots.
    pub fn live_count(&self) -> usize {
        self.deleted.iter().filter(|&&d| !d).count()
    }

    /// Returns `true` if any slot is tombstoned.
    pub fn has_tombstones(&self) -> bool {
        self.deleted.iter().any(|&d| d)
    }

    /// Vector of the given slot. O(1) slice into the arena.
    #[inline]
    pub fn vector(&self, slot: u32) -> &[f32] {
        let start = slot as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Returns `true` if the slot is tombstoned.
    #[inline]
    pub fn is_deleted(&self, slot: u32) -> bool {
        self.deleted[slot as usize]
    }

    /// Tombstones a slot. Returns `false` if the slot is out of bounds.
    pub fn mark_deleted(&mut self, slot: u32) -> bool {
        match self.deleted.get_mut(slot as usize) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    /// Samples a layer from the geometric distribution with `ml = 1/ln(m)`,
    /// capped at the configured maximum layer count.
    pub fn random_level(&mut self) -> usize {
        let ml = 1.0 / (self.m as f64).ln();
        let r: f64 = self.rng.gen();
        let level = (-r.ln() * ml).floor() as usize;
        level.min(config::HNSW_MAX_LAYERS - 1)
    }

    /// Appends a node's arena entries, with empty neighbor lists for layers
    /// `0..=level`. Returns the new slot.
    pub(crate) fn push_node(&mut self, vector: &[f32], level: usize) -> u32 {
        debug_assert_eq!(vector.len(), self.dimension);
        let slot = self.slot_count() as u32;
        self.vectors.extend_from_slice(vector);
        self.neighbors.push(vec![Vec::new(); level + 1]);
        self.layers.push(level as u8);
        self.deleted.push(false);
        slot
    }
}
