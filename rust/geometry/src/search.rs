// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Candidate search - enumerates element pairs that may need a connection.
//!
//! Two interchangeable strategies are provided behind
//! [`CandidateSearchStrategy`]: bounding-box overlap (the default) and the
//! legacy vertex-proximity search. Both visit elements in id order, store
//! pairs with `a < b` and return them sorted, so the output is deterministic.

use nalgebra::{Point3, Vector3};
use rigid_bond_core::{Element, ElementPair, ProgressEvent, SearchStrategyKind, Stage};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::spatial::{sort_neighbors, SpatialIndex};

/// A candidate element pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePair {
    pub pair: ElementPair,
    /// Running-average midpoint of close vertex pairs (vertex strategy only).
    pub location: Option<Point3<f64>>,
    /// Number of close vertex pairs found (vertex strategy only).
    pub vertex_pairs: usize,
}

impl CandidatePair {
    fn bare(pair: ElementPair) -> Self {
        Self {
            pair,
            location: None,
            vertex_pairs: 0,
        }
    }
}

/// Search inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub search_distance: f64,
    /// Maximum pairs per element; 0 means unlimited.
    pub connection_count_limit: usize,
}

/// Pair enumeration strategy.
pub trait CandidateSearchStrategy: Send + Sync {
    /// Strategy name for logging.
    fn name(&self) -> &'static str;

    /// Finds candidate pairs, sorted by `(a, b)`.
    ///
    /// Element ids must equal their positions in `elements`.
    fn search(
        &self,
        elements: &[Element],
        params: &SearchParams,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> Vec<CandidatePair>;
}

/// Returns the strategy for a configured kind.
pub fn strategy_for(kind: SearchStrategyKind) -> Box<dyn CandidateSearchStrategy> {
    match kind {
        SearchStrategyKind::BoundingBox => Box::new(BoundingBoxSearch),
        SearchStrategyKind::VertexProximity => Box::new(VertexProximitySearch),
    }
}

/// Per-element acceptance counter for the connection-count limit.
struct PairLimiter {
    limit: usize,
    counts: Vec<usize>,
}

impl PairLimiter {
    fn new(limit: usize, len: usize) -> Self {
        Self {
            limit,
            counts: vec![0; len],
        }
    }

    #[inline]
    fn is_full(&self, index: usize) -> bool {
        self.limit > 0 && self.counts[index] >= self.limit
    }

    fn accept(&mut self, pair: &ElementPair) {
        self.counts[pair.a().index()] += 1;
        self.counts[pair.b().index()] += 1;
    }
}

/// Bounding-box overlap search over an index of element centroids.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundingBoxSearch;

impl CandidateSearchStrategy for BoundingBoxSearch {
    fn name(&self) -> &'static str {
        "bounding_box"
    }

    fn search(
        &self,
        elements: &[Element],
        params: &SearchParams,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> Vec<CandidatePair> {
        let total = elements.len();
        let half = params.search_distance * 0.5;
        let centroids: Vec<Point3<f64>> = elements.iter().map(|e| e.centroid).collect();
        let grown: Vec<_> = elements.iter().map(|e| e.bounds.expanded(half)).collect();
        let max_half_diag = elements
            .iter()
            .map(|e| e.bounds.half_diagonal())
            .fold(0.0, f64::max);
        let index = SpatialIndex::build_auto(&centroids);

        let mut limiter = PairLimiter::new(params.connection_count_limit, total);
        let mut seen: FxHashSet<ElementPair> = FxHashSet::default();
        let mut pairs = Vec::new();

        for (i, element) in elements.iter().enumerate() {
            progress(ProgressEvent {
                stage: Stage::Search,
                done: i + 1,
                total,
            });
            if limiter.is_full(i) || !element.bounds.is_valid() {
                continue;
            }

            let neighbors = if params.connection_count_limit > 0 {
                index.query_k_nearest(&element.centroid, params.connection_count_limit, Some(i))
            } else {
                let reach =
                    element.bounds.half_diagonal() + max_half_diag + params.search_distance;
                let mut hits = index.query_radius(&element.centroid, reach, Some(i));
                sort_neighbors(&mut hits);
                hits
            };

            for n in neighbors {
                if limiter.is_full(i) {
                    break;
                }
                let Some(pair) = ElementPair::new(element.id, elements[n.id].id) else {
                    continue;
                };
                if seen.contains(&pair) || limiter.is_full(n.id) {
                    continue;
                }
                if grown[i].intersection_volume(&grown[n.id]) > 0.0 {
                    seen.insert(pair);
                    limiter.accept(&pair);
                    pairs.push(CandidatePair::bare(pair));
                }
            }
        }

        pairs.sort_by_key(|c| c.pair);
        tracing::debug!(
            strategy = self.name(),
            elements = total,
            pairs = pairs.len(),
            "candidate search finished"
        );
        pairs
    }
}

/// Legacy search: pairs of elements owning vertices within search distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexProximitySearch;

struct VertexAccumulator {
    sum: Vector3<f64>,
    count: usize,
}

impl Default for VertexAccumulator {
    fn default() -> Self {
        Self {
            sum: Vector3::zeros(),
            count: 0,
        }
    }
}

impl CandidateSearchStrategy for VertexProximitySearch {
    fn name(&self) -> &'static str {
        "vertex_proximity"
    }

    fn search(
        &self,
        elements: &[Element],
        params: &SearchParams,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> Vec<CandidatePair> {
        let total = elements.len();
        let mut points = Vec::new();
        let mut owners = Vec::new();
        for (i, element) in elements.iter().enumerate() {
            for v in &element.vertices {
                points.push(*v);
                owners.push(i);
            }
        }
        // Non-positive distances fall back to an automatic cell size
        let index = SpatialIndex::build(&points, params.search_distance);

        let mut limiter = PairLimiter::new(params.connection_count_limit, total);
        let mut found: FxHashMap<ElementPair, VertexAccumulator> = FxHashMap::default();
        let mut order: Vec<ElementPair> = Vec::new();

        for (i, element) in elements.iter().enumerate() {
            progress(ProgressEvent {
                stage: Stage::Search,
                done: i + 1,
                total,
            });

            for v in &element.vertices {
                let mut hits = index.query_radius(v, params.search_distance, None);
                sort_neighbors(&mut hits);
                for n in hits {
                    let j = owners[n.id];
                    // Each pair is collected from its lower endpoint
                    if j <= i {
                        continue;
                    }
                    let Some(pair) = ElementPair::new(element.id, elements[j].id) else {
                        continue;
                    };
                    if !found.contains_key(&pair) {
                        if limiter.is_full(i) || limiter.is_full(j) {
                            continue;
                        }
                        limiter.accept(&pair);
                        order.push(pair);
                    }
                    let acc = found.entry(pair).or_default();
                    acc.sum += nalgebra::center(v, &n.point).coords;
                    acc.count += 1;
                }
            }
        }

        let mut pairs: Vec<CandidatePair> = order
            .into_iter()
            .map(|pair| {
                let acc = &found[&pair];
                CandidatePair {
                    pair,
                    location: Some(Point3::from(acc.sum / acc.count as f64)),
                    vertex_pairs: acc.count,
                }
            })
            .collect();
        pairs.sort_by_key(|c| c.pair);
        tracing::debug!(
            strategy = self.name(),
            vertices = points.len(),
            pairs = pairs.len(),
            "candidate search finished"
        );
        pairs
    }
}
