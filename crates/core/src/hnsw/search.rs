//! HNSW search: bounded best-first layer search and multi-layer KNN.
//!
//! Tombstoned slots are excluded from results but still traversed for
//! navigation, so deletions never disconnect the graph for readers. Ties on
//! equal distance resolve toward the lower slot, which is also the lower
//! internal key since slots are assigned in key order.

use crate::hnsw::graph::HnswGraph;
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// Frontier entry: max-heap on negated distance, so the closest candidate
/// pops first. Equal distances pop the lower slot first.
#[derive(Debug, PartialEq, Eq)]
struct FrontierEntry {
    neg_distance: OrderedFloat<f32>,
    slot: u32,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.neg_distance
            .cmp(&other.neg_distance)
            .then_with(|| other.slot.cmp(&self.slot))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Result entry: max-heap on distance, so the worst held candidate sits on
/// top for pruning. Equal distances evict the higher slot first.
#[derive(Debug, PartialEq, Eq)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    slot: u32,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Searches a single layer, returning up to `ef` slots closest to `query`,
/// sorted by ascending distance.
///
/// With `include_deleted` set, tombstoned slots appear in the result list.
/// Construction uses this so new nodes still link through tombstones instead
/// of ending up unreachable in a heavily-deleted graph; query-time result
/// collection passes `false`.
///
/// `visited` is cleared on entry and reused across calls to avoid repeated
/// allocation.
pub fn search_layer(
    graph: &HnswGraph,
    query: &[f32],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
    include_deleted: bool,
) -> Vec<(f32, u32)> {
    visited.clear();
    let mut frontier: BinaryHeap<FrontierEntry> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef + 1);
    // Cached worst held distance, refreshed on every results change.
    let mut worst = f32::MAX;

    for &ep in entry_points {
        if visited.insert(ep) {
            let dist = graph.metric.distance(query, graph.vector(ep));
            frontier.push(FrontierEntry {
                neg_distance: OrderedFloat(-dist),
                slot: ep,
            });
            if include_deleted || !graph.is_deleted(ep) {
                results.push(ResultEntry {
                    distance: OrderedFloat(dist),
                    slot: ep,
                });
                if results.len() >= ef {
                    worst = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }
    }

    while let Some(candidate) = frontier.pop() {
        let c_dist = -candidate.neg_distance.0;
        if results.len() >= ef && c_dist > worst {
            break;
        }

        let slot = candidate.slot as usize;
        let Some(layer_links) = graph.neighbors[slot].get(layer) else {
            continue;
        };

        for &peer in layer_links {
            if !visited.insert(peer) {
                continue;
            }
            let dist = graph.metric.distance(query, graph.vector(peer));
            if results.len() < ef || dist < worst {
                frontier.push(FrontierEntry {
                    neg_distance: OrderedFloat(-dist),
                    slot: peer,
                });
                if include_deleted || !graph.is_deleted(peer) {
                    results.push(ResultEntry {
                        distance: OrderedFloat(dist),
                        slot: peer,
                    });
                    if results.len() > ef {
                        results.pop();
                    }
                    worst = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|r| (r.distance.0, r.slot))
        .collect()
}

/// Multi-layer KNN: greedy descent from the entry point through the upper
/// layers, then a bounded best-first search of the base layer with breadth
/// `max(ef, k)`. Returns up to `k` live slots by ascending distance.
pub fn knn_search(graph: &HnswGraph, query: &[f32], k: usize, ef: usize) -> Vec<(f32, u32)> {
    let Some(entry_point) = graph.entry_point else {
        return Vec::new();
    };

    let mut visited = VisitedSet::new(graph.slot_count());
    let mut current = entry_point;
    // Descent is pure navigation, so tombstones may guide it.
    for layer in (1..=graph.max_layer).rev() {
        let nearest = search_layer(
            graph,
            query,
            std::slice::from_ref(&current),
            1,
            layer,
            &mut visited,
            true,
        );
        if let Some(&(_, slot)) = nearest.first() {
            current = slot;
        }
    }

    let ef = ef.max(k);
    let mut results = search_layer(
        graph,
        query,
        std::slice::from_ref(&current),
        ef,
        0,
        &mut visited,
        false,
    );
    results.truncate(k);
    results
}
