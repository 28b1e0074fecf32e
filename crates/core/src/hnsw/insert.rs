//! HNSW insertion: greedy descent, candidate collection, heuristic neighbor
//! selection (the diversity filter of Algorithm 4 in the HNSW paper),
//! bidirectional linking, and over-capacity re-pruning.

use crate::hnsw::graph::HnswGraph;
use crate::hnsw::search::search_layer;
use crate::hnsw::visited::VisitedSet;
use std::cell::RefCell;
use std::cmp::Ordering;

thread_local! {
    // Reusable visited set: inserts run under the collection write lock, so
    // one per thread is enough and saves a per-insert allocation.
    static INSERT_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

impl HnswGraph {
    /// Inserts a vector and wires it into every layer up to its sampled
    /// level. Returns the new slot.
    pub fn insert(&mut self, vector: &[f32]) -> u32 {
        debug_assert_eq!(vector.len(), self.dimension);
        let level = self.random_level();
        let slot = self.slot_count() as u32;

        let Some(entry_point) = self.entry_point else {
            self.push_node(vector, level);
            self.entry_point = Some(slot);
            self.max_layer = level;
            return slot;
        };

        let top = level.min(self.max_layer);

        // Phases 1 & 2 only read the graph; the visited set lives outside it.
        let per_layer_links = INSERT_VISITED.with(|cell| {
            let mut visited = cell.borrow_mut();
            visited.ensure_capacity(self.slot_count() + 1);

            // Phase 1: greedy descent through the layers above the node's
            // level, frontier of one. Tombstoned slots still count as link
            // candidates during construction, so the graph stays connected
            // through deletions.
            let mut current = entry_point;
            for layer in (level + 1..=self.max_layer).rev() {
                let nearest = search_layer(
                    self,
                    vector,
                    std::slice::from_ref(&current),
                    1,
                    layer,
                    &mut visited,
                    true,
                );
                if let Some(&(_, nearest_slot)) = nearest.first() {
                    current = nearest_slot;
                }
            }

            // Phase 2: collect ef_construction candidates per layer and keep
            // a diverse subset.
            let mut per_layer: Vec<Vec<u32>> = vec![Vec::new(); level + 1];
            let mut entry_points = vec![current];
            for layer in (0..=top).rev() {
                let candidates = search_layer(
                    self,
                    vector,
                    &entry_points,
                    self.ef_construction,
                    layer,
                    &mut visited,
                    true,
                );
                let cap = if layer == 0 { self.m_max0 } else { self.m };
                per_layer[layer] = select_neighbors(self, &candidates, cap)
                    .into_iter()
                    .map(|(_, s)| s)
                    .collect();

                entry_points.clear();
                entry_points.extend(candidates.iter().map(|&(_, s)| s));
                if entry_points.is_empty() {
                    entry_points.push(entry_point);
                }
            }
            per_layer
        });

        self.push_node(vector, level);
        for (layer, links) in per_layer_links.into_iter().enumerate() {
            self.neighbors[slot as usize][layer] = links;
        }

        // Phase 3: back-edges, pruning any neighbor that overflows its cap.
        for layer in 0..=top {
            let cap = if layer == 0 { self.m_max0 } else { self.m };
            let links: Vec<u32> = self.neighbors[slot as usize][layer].clone();
            for &peer in &links {
                let p = peer as usize;
                while self.neighbors[p].len() <= layer {
                    self.neighbors[p].push(Vec::new());
                }
                self.neighbors[p][layer].push(slot);

                if self.neighbors[p][layer].len() > cap {
                    let candidates: Vec<(f32, u32)> = self.neighbors[p][layer]
                        .iter()
                        .map(|&c| (self.metric.distance(self.vector(peer), self.vector(c)), c))
                        .collect();
                    let pruned = select_neighbors(self, &candidates, cap);
                    self.neighbors[p][layer] = pruned.into_iter().map(|(_, s)| s).collect();
                }
            }
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(slot);
        }
        slot
    }
}

/// Heuristic neighbor selection: keep a candidate only if no already-kept
/// neighbor is closer to it than the candidate is to the base point. Prefers
/// diverse directions over redundant near-duplicates. Unfilled slots are
/// backfilled with the closest rejected candidates.
fn select_neighbors(graph: &HnswGraph, candidates: &[(f32, u32)], m: usize) -> Vec<(f32, u32)> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m);
    for &(dist, cand) in &sorted {
        if selected.len() >= m {
            break;
        }
        let diverse = selected.iter().all(|&(_, kept)| {
            dist <= graph.metric.distance(graph.vector(cand), graph.vector(kept))
        });
        if diverse {
            selected.push((dist, cand));
        }
    }

    if selected.len() < m {
        let kept: std::collections::HashSet<u32> = selected.iter().map(|&(_, s)| s).collect();
        for &(dist, cand) in &sorted {
            if selected.len() >= m {
                break;
            }
            if !kept.contains(&cand) {
                selected.push((dist, cand));
            }
        }
    }

    selected
}
