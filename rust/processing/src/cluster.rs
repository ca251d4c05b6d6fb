// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pairwise proximity clustering of connection locations.
//!
//! Every pass rebuilds a spatial index over the distinct locations and merges
//! each location with its nearest partner closer than the radius; both move
//! to their midpoint. A location pairs with its nearest unmerged partner, not
//! the first one found within the radius, and merges at most once per pass.
//! Passes repeat until none merges anything. Each merge removes at least one
//! distinct location, so the loop ends after at most `distinct + 1` passes.

use nalgebra::Point3;
use rigid_bond_core::{ProgressEvent, Stage};
use rigid_bond_geometry::SpatialIndex;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Clustering statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterReport {
    pub passes: usize,
    pub merges: usize,
    /// Distinct location count before the first pass.
    pub initial_distinct: usize,
    /// Distinct location count after each pass.
    pub distinct_per_pass: Vec<usize>,
}

/// Merges locations closer than `radius` in place. A radius of 0 disables
/// clustering.
pub fn cluster_locations(
    locations: &mut [Point3<f64>],
    radius: f64,
    progress: &mut dyn FnMut(ProgressEvent),
) -> ClusterReport {
    let (mut distinct, mut slot_of) = distinct_locations(locations);
    let mut report = ClusterReport {
        initial_distinct: distinct.len(),
        ..ClusterReport::default()
    };
    if radius <= 0.0 || distinct.len() < 2 {
        return report;
    }

    let max_passes = distinct.len() + 1;
    while report.passes < max_passes {
        let merges = merge_pass(&mut distinct, radius);
        report.passes += 1;
        report.merges += merges;

        // Write back, then collapse locations that became identical
        for (loc, &slot) in locations.iter_mut().zip(&slot_of) {
            *loc = distinct[slot];
        }
        let (next, next_slots) = distinct_locations(locations);
        distinct = next;
        slot_of = next_slots;
        report.distinct_per_pass.push(distinct.len());

        progress(ProgressEvent {
            stage: Stage::Cluster,
            done: report.passes,
            total: 0,
        });
        tracing::debug!(pass = report.passes, merges, distinct = distinct.len(), "cluster pass");
        if merges == 0 {
            break;
        }
    }

    tracing::info!(
        passes = report.passes,
        merges = report.merges,
        before = report.initial_distinct,
        after = distinct.len(),
        "connection locations clustered"
    );
    report
}

/// One pass over the distinct locations. Returns the number of merges.
fn merge_pass(distinct: &mut [Point3<f64>], radius: f64) -> usize {
    let index = SpatialIndex::build(distinct, radius);
    let mut merged = vec![false; distinct.len()];
    let mut merges = 0;

    for i in 0..distinct.len() {
        if merged[i] {
            continue;
        }
        let center = index.point(i).unwrap_or(distinct[i]);
        let partner = index
            .query_radius(&center, radius, Some(i))
            .into_iter()
            .filter(|n| n.distance > 0.0 && n.distance < radius && !merged[n.id])
            .min_by(|l, r| l.distance.total_cmp(&r.distance).then(l.id.cmp(&r.id)));
        let Some(partner) = partner else {
            continue;
        };

        let mid = nalgebra::center(&center, &partner.point);
        distinct[i] = mid;
        distinct[partner.id] = mid;
        merged[i] = true;
        merged[partner.id] = true;
        merges += 1;
    }
    merges
}

/// Distinct locations in first-seen order and each input's slot among them.
fn distinct_locations(locations: &[Point3<f64>]) -> (Vec<Point3<f64>>, Vec<usize>) {
    let mut seen: FxHashMap<[u64; 3], usize> = FxHashMap::default();
    let mut distinct = Vec::new();
    let slots: Vec<usize> = locations
        .iter()
        .map(|p| {
            // +0.0 and -0.0 are the same location
            let key = [p.x + 0.0, p.y + 0.0, p.z + 0.0].map(f64::to_bits);
            *seen.entry(key).or_insert_with(|| {
                distinct.push(*p);
                distinct.len() - 1
            })
        })
        .collect();
    (distinct, slots)
}
