// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection filter stages.
//!
//! Stages run in a fixed order, each on the survivors of the previous one:
//!
//! 1. zero-area removal (pairs that only need collision suppression are
//!    kept with area 0)
//! 2. undersized-element reparenting
//! 3. predefined-constraint exclusion
//! 4. group connectivity rules

use rigid_bond_core::{Element, ElementId, ElementPair, GroupTable, RunConfig, AREA_EPSILON};
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::connection::ConnectionSet;
use crate::priority::PriorityResolver;

/// An endpoint counts as vertical when its unit offset to the connection has
/// a z component above this.
const VERTICAL_THRESHOLD: f64 = 0.7;

/// Removal counts per filter stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub input: usize,
    pub zero_area_removed: usize,
    pub suppression_kept: usize,
    pub reparented_removed: usize,
    pub predefined_removed: usize,
    pub cross_group_removed: usize,
    pub horizontal_removed: usize,
    pub output: usize,
}

/// A child element attached to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReparentAssignment {
    pub child: ElementId,
    pub parent: ElementId,
    pub distance: f64,
}

/// Undersized elements merged into neighbors, for the host to apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReparentPlan {
    /// One entry per child, sorted by child id.
    pub assignments: Vec<ReparentAssignment>,
    /// Parent mass including all children, sorted by parent id.
    pub parent_masses: Vec<(ElementId, f64)>,
}

impl ReparentPlan {
    pub fn parent_of(&self, child: ElementId) -> Option<ElementId> {
        self.assignments
            .binary_search_by_key(&child, |a| a.child)
            .ok()
            .map(|i| self.assignments[i].parent)
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Inputs shared by the filter stages.
pub struct FilterContext<'a> {
    pub elements: &'a [Element],
    pub groups: &'a GroupTable,
    pub config: &'a RunConfig,
    pub predefined: &'a FxHashSet<ElementPair>,
    /// Element masses, indexed like `elements`.
    pub masses: &'a [f64],
}

/// Runs all filter stages in order.
pub fn filter_connections(
    set: &mut ConnectionSet,
    ctx: &FilterContext<'_>,
) -> (FilterReport, ReparentPlan) {
    let mut report = FilterReport {
        input: set.len(),
        ..FilterReport::default()
    };

    let (removed, kept) = remove_zero_area(set, ctx);
    report.zero_area_removed = removed;
    report.suppression_kept = kept;

    let (removed, plan) = reparent_undersized(set, ctx);
    report.reparented_removed = removed;

    report.predefined_removed = exclude_predefined(set, ctx.predefined);

    let (cross, horizontal) = apply_group_rules(set, ctx);
    report.cross_group_removed = cross;
    report.horizontal_removed = horizontal;

    report.output = set.len();
    tracing::info!(
        input = report.input,
        zero_area = report.zero_area_removed,
        suppression_kept = report.suppression_kept,
        reparented = report.reparented_removed,
        predefined = report.predefined_removed,
        cross_group = report.cross_group_removed,
        horizontal = report.horizontal_removed,
        output = report.output,
        "connections filtered"
    );
    (report, plan)
}

/// Stage 1. Returns `(removed, kept_for_suppression)`.
pub fn remove_zero_area(set: &mut ConnectionSet, ctx: &FilterContext<'_>) -> (usize, usize) {
    let resolver = PriorityResolver::new(ctx.groups, ctx.config);
    let mut kept = 0;
    let removed = set.retain(|_, c| {
        let (a, b) = (c.pair.a(), c.pair.b());
        let Err(err) = c.contact.check(a, b) else {
            return true;
        };
        let ga = ctx.groups.index_of(&ctx.elements[a.index()].group);
        let gb = ctx.groups.index_of(&ctx.elements[b.index()].group);
        if resolver.suppression_requested(ga, gb) {
            c.contact.area = 0.0;
            c.suppression_only = true;
            kept += 1;
            true
        } else {
            tracing::debug!(error = %err, "connection dropped");
            false
        }
    });
    (removed, kept)
}

/// Stage 2. Returns the number of removed connections and the plan.
pub fn reparent_undersized(
    set: &mut ConnectionSet,
    ctx: &FilterContext<'_>,
) -> (usize, ReparentPlan) {
    let minimum = ctx.config.minimum_element_size;
    if minimum <= 0.0 {
        return (0, ReparentPlan::default());
    }
    let undersized = |id: ElementId| ctx.elements[id.index()].largest_dimension() < minimum;

    let mut candidates: Vec<ReparentAssignment> = Vec::new();
    let removed = set.retain(|_, c| {
        let (a, b) = (c.pair.a(), c.pair.b());
        let (child, parent) = match (undersized(a), undersized(b)) {
            (true, false) => (a, b),
            (false, true) => (b, a),
            _ => return true,
        };
        let distance =
            (ctx.elements[child.index()].centroid - ctx.elements[parent.index()].centroid).norm();
        candidates.push(ReparentAssignment {
            child,
            parent,
            distance,
        });
        false
    });

    candidates.sort_by(|l, r| {
        l.distance
            .total_cmp(&r.distance)
            .then(l.child.cmp(&r.child))
            .then(l.parent.cmp(&r.parent))
    });
    let mut assigned: FxHashSet<ElementId> = FxHashSet::default();
    let mut assignments: Vec<ReparentAssignment> = candidates
        .into_iter()
        .filter(|c| assigned.insert(c.child))
        .collect();
    assignments.sort_by_key(|a| a.child);

    let mut parents: Vec<ElementId> = assignments.iter().map(|a| a.parent).collect();
    parents.sort();
    parents.dedup();
    let mass = |id: ElementId| ctx.masses.get(id.index()).copied().unwrap_or(0.0);
    let parent_masses = parents
        .into_iter()
        .map(|p| {
            let children: f64 = assignments
                .iter()
                .filter(|a| a.parent == p)
                .map(|a| mass(a.child))
                .sum();
            (p, mass(p) + children)
        })
        .collect();

    tracing::debug!(children = assignments.len(), "undersized elements reparented");
    (
        removed,
        ReparentPlan {
            assignments,
            parent_masses,
        },
    )
}

/// Stage 3.
pub fn exclude_predefined(set: &mut ConnectionSet, predefined: &FxHashSet<ElementPair>) -> usize {
    if predefined.is_empty() {
        return 0;
    }
    set.retain(|_, c| !predefined.contains(&c.pair))
}

/// Stage 4. Returns `(cross_group_removed, horizontal_removed)`.
pub fn apply_group_rules(set: &mut ConnectionSet, ctx: &FilterContext<'_>) -> (usize, usize) {
    let mut cross = 0;
    let mut horizontal = 0;
    set.retain(|_, c| {
        let (ea, eb) = (&ctx.elements[c.pair.a().index()], &ctx.elements[c.pair.b().index()]);
        let (ia, ib) = (ctx.groups.index_of(&ea.group), ctx.groups.index_of(&eb.group));
        if ia == ib {
            return true;
        }
        let (ga, gb) = (ctx.groups.get(ia), ctx.groups.get(ib));

        if (ga.flags.no_cross_group || gb.flags.no_cross_group) && ga.priority == gb.priority {
            cross += 1;
            return false;
        }
        if ga.flags.no_horizontal_cross_group || gb.flags.no_horizontal_cross_group {
            let vertical = |e: &Element| {
                let offset = c.location - e.centroid;
                let len = offset.norm();
                len > 0.0 && (offset.z / len).abs() > VERTICAL_THRESHOLD
            };
            if !vertical(ea) && !vertical(eb) {
                horizontal += 1;
                return false;
            }
        }
        true
    });
    (cross, horizontal)
}
