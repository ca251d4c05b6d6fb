// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Priority resolution between the element groups of a connection.
//!
//! Decides which group governs a pair, which connection type it gets and
//! the real-world breaking thresholds (N, or N·m for bending). The decision
//! is symmetric: swapping the endpoints never changes the result.

use std::cmp::Ordering;

use nalgebra::Point3;
use rigid_bond_core::topology::{Topology, INDESTRUCTIBLE, SUPPRESSION_ONLY};
use rigid_bond_core::units::{area_to_mm2, length_to_mm};
use rigid_bond_core::{
    ContactGeometry, ElementGroup, Error, Expr, GroupIndex, GroupTable, RunConfig, Vars,
};
use rigid_bond_geometry::effective_contact;
use serde::Serialize;

/// Real-world thresholds of a connection, after the group multiplier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Thresholds {
    pub compressive: f64,
    pub tensile: f64,
    pub shear: f64,
    pub shear_90: Option<f64>,
    pub bend: f64,
    pub bend_90: Option<f64>,
    pub plastic: f64,
}

impl Thresholds {
    /// Per-value min or max of two threshold sets. A set without a 90°
    /// variant contributes its base value for that variant.
    fn combine(&self, other: &Thresholds, prefer_lower: bool) -> Thresholds {
        let pick = |a: f64, b: f64| if prefer_lower { a.min(b) } else { a.max(b) };
        let pick_opt = |a: Option<f64>, a_base: f64, b: Option<f64>, b_base: f64| {
            if a.is_none() && b.is_none() {
                return None;
            }
            Some(pick(a.unwrap_or(a_base), b.unwrap_or(b_base)))
        };
        Thresholds {
            compressive: pick(self.compressive, other.compressive),
            tensile: pick(self.tensile, other.tensile),
            shear: pick(self.shear, other.shear),
            shear_90: pick_opt(self.shear_90, self.shear, other.shear_90, other.shear),
            bend: pick(self.bend, other.bend),
            bend_90: pick_opt(self.bend_90, self.bend, other.bend_90, other.bend),
            plastic: pick(self.plastic, other.plastic),
        }
    }
}

/// One side of a connection as seen by the resolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Endpoint {
    pub group: GroupIndex,
    /// Whether the element is an active rigid body.
    pub active: bool,
    /// Volume-based area correction factor of the element.
    pub volume_factor: f64,
}

/// Outcome of resolving one connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub governing: GroupIndex,
    pub topology: &'static Topology,
    pub thresholds: Thresholds,
    /// Contact after the governing group's area corrections.
    pub contact: ContactGeometry,
}

impl Resolution {
    #[inline]
    pub fn topology_id(&self) -> i32 {
        self.topology.id
    }
}

/// Resolves governing groups and thresholds against one group table and run
/// configuration.
#[derive(Debug, Clone, Copy)]
pub struct PriorityResolver<'a> {
    groups: &'a GroupTable,
    config: &'a RunConfig,
}

impl<'a> PriorityResolver<'a> {
    pub fn new(groups: &'a GroupTable, config: &'a RunConfig) -> Self {
        Self { groups, config }
    }

    /// Picks the governing group of two, ignoring element activity.
    ///
    /// An active group beats a passive one. Otherwise higher priority wins,
    /// then the type with fewer slots, then the earlier table entry, then the
    /// smaller name.
    pub fn governing_group(&self, a: GroupIndex, b: GroupIndex) -> GroupIndex {
        if a == b {
            return a;
        }
        let (ga, gb) = (self.groups.get(a), self.groups.get(b));
        match (ga.is_active(), gb.is_active()) {
            (true, false) => return a,
            (false, true) => return b,
            _ => {}
        }
        if self.precedence(ga, gb) == Ordering::Greater {
            b
        } else {
            a
        }
    }

    /// `Less` when `ga` takes precedence over `gb`.
    fn precedence(&self, ga: &ElementGroup, gb: &ElementGroup) -> Ordering {
        let rank = |g: &ElementGroup| {
            g.connection_type
                .topology()
                .map(|t| (t.slot_count(), t.table_rank()))
                .unwrap_or((usize::MAX, usize::MAX))
        };
        gb.priority
            .cmp(&ga.priority)
            .then_with(|| rank(ga).cmp(&rank(gb)))
            .then_with(|| ga.name.cmp(&gb.name))
    }

    /// Whether collision suppression is requested for a pair of groups:
    /// globally, by the governing active group, or by either of two passive
    /// groups.
    pub fn suppression_requested(&self, a: GroupIndex, b: GroupIndex) -> bool {
        if self.config.permanent_collision_suppression {
            return true;
        }
        let (ga, gb) = (self.groups.get(a), self.groups.get(b));
        if ga.is_active() || gb.is_active() {
            self.groups
                .get(self.governing_group(a, b))
                .flags
                .permanent_collision_suppression
        } else {
            ga.flags.permanent_collision_suppression || gb.flags.permanent_collision_suppression
        }
    }

    /// Resolves one connection. `None` means no connection is created.
    pub fn resolve(
        &self,
        a: &Endpoint,
        b: &Endpoint,
        contact: &ContactGeometry,
        location: &Point3<f64>,
        suppression_only: bool,
    ) -> Option<Resolution> {
        let governing = self.governing_group(a.group, b.group);
        let group = self.groups.get(governing);
        let contact = effective_contact(
            contact,
            a.volume_factor,
            b.volume_factor,
            group.flags.volume_area_correction,
            group.flags.cylindrical_section,
        );
        let special = |topology: &'static Topology| {
            Some(Resolution {
                governing,
                topology,
                thresholds: Thresholds::default(),
                contact,
            })
        };

        if suppression_only {
            return special(&SUPPRESSION_ONLY);
        }

        let (ga, gb) = (self.groups.get(a.group), self.groups.get(b.group));
        match (ga.is_active(), gb.is_active()) {
            (true, true) => {
                let topology = group.connection_type.topology()?;
                let vars = threshold_vars(&contact, location);
                let thresholds = if ga.priority == gb.priority && a.group != b.group {
                    evaluate(ga, &vars).combine(&evaluate(gb, &vars), self.config.prefer_lower_threshold)
                } else {
                    evaluate(group, &vars)
                };
                Some(Resolution {
                    governing,
                    topology,
                    thresholds,
                    contact,
                })
            }
            (true, false) | (false, true) => {
                if !self.config.passive_breaking {
                    return special(&INDESTRUCTIBLE);
                }
                let topology = group.connection_type.topology()?;
                let vars = threshold_vars(&contact, location);
                Some(Resolution {
                    governing,
                    topology,
                    thresholds: evaluate(group, &vars),
                    contact,
                })
            }
            (false, false) => match (a.active, b.active) {
                (true, false) | (false, true) => special(&INDESTRUCTIBLE),
                (true, true) if self.suppression_requested(a.group, b.group) => {
                    special(&SUPPRESSION_ONLY)
                }
                _ => None,
            },
        }
    }
}

/// Formula variables: area in mm², height and width in mm, location in m.
pub fn threshold_vars(contact: &ContactGeometry, location: &Point3<f64>) -> Vars {
    Vars {
        a: area_to_mm2(contact.area),
        h: length_to_mm(contact.height),
        w: length_to_mm(contact.width),
        x: location.x,
        y: location.y,
        z: location.z,
    }
}

/// Evaluates every threshold formula of a group.
pub fn evaluate(group: &ElementGroup, vars: &Vars) -> Thresholds {
    let t = &group.thresholds;
    let value = |label: &str, expr: &Expr| evaluate_one(group, label, expr, vars);
    Thresholds {
        compressive: value("compressive", &t.compressive),
        tensile: value("tensile", &t.tensile),
        shear: value("shear", &t.shear),
        shear_90: t.shear_90.as_ref().map(|e| value("shear 90°", e)),
        bend: value("bend", &t.bend),
        bend_90: t.bend_90.as_ref().map(|e| value("bend 90°", e)),
        plastic: value("plastic", &t.plastic),
    }
}

fn evaluate_one(group: &ElementGroup, label: &str, expr: &Expr, vars: &Vars) -> f64 {
    let value = expr.eval(vars) * group.multiplier;
    if value.is_finite() {
        value
    } else {
        let err = Error::Configuration {
            group: group.name.clone(),
            message: format!("{} threshold '{}' evaluated to {}", label, expr.source(), value),
        };
        tracing::warn!(error = %err, "threshold evaluation failed, using 0");
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rigid_bond_core::{Axis, GroupDef, GroupFlags};

    fn contact(area: f64) -> ContactGeometry {
        ContactGeometry {
            area,
            height: 0.2,
            width: area / 0.2,
            axis_normal: Axis::Z,
            axis_height: Axis::X,
            axis_width: Axis::Y,
            correction_needed: false,
        }
    }

    fn table(defs: Vec<GroupDef>) -> GroupTable {
        GroupTable::new(&defs, 100).unwrap()
    }

    fn endpoint(groups: &GroupTable, name: &str, active: bool) -> Endpoint {
        Endpoint {
            group: groups.index_of(name),
            active,
            volume_factor: 1.0,
        }
    }

    fn resolve_both(
        resolver: &PriorityResolver,
        a: &Endpoint,
        b: &Endpoint,
    ) -> (Option<Resolution>, Option<Resolution>) {
        let c = contact(0.1);
        let loc = Point3::new(1.0, 2.0, 3.0);
        (
            resolver.resolve(a, b, &c, &loc, false),
            resolver.resolve(b, a, &c, &loc, false),
        )
    }

    #[test]
    fn higher_priority_governs() {
        let groups = table(vec![
            GroupDef::new("concrete", 8).with_strengths(30.0, 3.0, 4.0).with_priority(1),
            GroupDef::new("steel", 1).with_strengths(200.0, 200.0, 100.0).with_priority(5),
        ]);
        let config = RunConfig::default();
        let resolver = PriorityResolver::new(&groups, &config);
        let a = endpoint(&groups, "concrete", true);
        let b = endpoint(&groups, "steel", true);
        let (ab, ba) = resolve_both(&resolver, &a, &b);
        assert_eq!(ab, ba);
        let r = ab.unwrap();
        assert_eq!(r.governing, groups.index_of("steel"));
        assert_eq!(r.topology_id(), 1);
        assert_relative_eq!(r.thresholds.compressive, 200.0 * 1.0e5, max_relative = 1e-12);
    }

    #[test]
    fn same_priority_fewer_slots_governs_and_thresholds_combine() {
        let groups = table(vec![
            GroupDef::new("a", 8).with_strengths(30.0, 3.0, 4.0),
            GroupDef::new("b", 6).with_strengths(20.0, 5.0, 2.0),
        ]);
        let lower = RunConfig::default();
        let resolver = PriorityResolver::new(&groups, &lower);
        let (ab, ba) = resolve_both(
            &resolver,
            &endpoint(&groups, "a", true),
            &endpoint(&groups, "b", true),
        );
        assert_eq!(ab, ba);
        let r = ab.unwrap();
        assert_eq!(r.governing, groups.index_of("b"));
        assert_relative_eq!(r.thresholds.compressive, 20.0 * 1.0e5, max_relative = 1e-12);
        assert_relative_eq!(r.thresholds.tensile, 3.0 * 1.0e5, max_relative = 1e-12);
        assert_relative_eq!(r.thresholds.shear, 2.0 * 1.0e5, max_relative = 1e-12);

        let higher = RunConfig {
            prefer_lower_threshold: false,
            ..RunConfig::default()
        };
        let resolver = PriorityResolver::new(&groups, &higher);
        let r = resolver
            .resolve(
                &endpoint(&groups, "a", true),
                &endpoint(&groups, "b", true),
                &contact(0.1),
                &Point3::origin(),
                false,
            )
            .unwrap();
        assert_relative_eq!(r.thresholds.compressive, 30.0 * 1.0e5, max_relative = 1e-12);
    }

    #[test]
    fn one_sided_angled_thresholds_combine_with_base() {
        let mut plain = GroupDef::new("plain", 10).with_strengths(10.0, 1.0, 1.0);
        plain.bend_90 = None;
        let mut angled = GroupDef::new("angled", 10).with_strengths(10.0, 5.0, 5.0);
        angled.shear_90 = Some("800000".to_string());
        angled.bend_90 = Some("900000".to_string());
        let groups = table(vec![plain, angled]);

        let vars = threshold_vars(&contact(0.1), &Point3::new(1.0, 2.0, 3.0));
        let weak = evaluate(groups.resolve("plain"), &vars);
        assert_eq!(weak.shear_90, None);
        assert_eq!(weak.bend_90, None);
        assert_relative_eq!(weak.shear, 1.0e5, max_relative = 1e-12);

        let a = endpoint(&groups, "plain", true);
        let b = endpoint(&groups, "angled", true);

        let lower = RunConfig::default();
        let resolver = PriorityResolver::new(&groups, &lower);
        let (ab, ba) = resolve_both(&resolver, &a, &b);
        assert_eq!(ab, ba);
        let t = ab.unwrap().thresholds;
        assert_relative_eq!(t.shear, weak.shear, max_relative = 1e-12);
        assert_relative_eq!(t.shear_90.unwrap(), weak.shear, max_relative = 1e-12);
        assert_relative_eq!(t.bend_90.unwrap(), weak.bend, max_relative = 1e-12);
        assert!(t.shear_90.unwrap() <= t.shear);

        let higher = RunConfig {
            prefer_lower_threshold: false,
            ..RunConfig::default()
        };
        let resolver = PriorityResolver::new(&groups, &higher);
        let (ab, ba) = resolve_both(&resolver, &a, &b);
        assert_eq!(ab, ba);
        let t = ab.unwrap().thresholds;
        assert_relative_eq!(t.shear, 5.0e5, max_relative = 1e-12);
        assert_relative_eq!(t.shear_90.unwrap(), 800000.0, max_relative = 1e-12);
        assert_relative_eq!(t.bend_90.unwrap(), 900000.0, max_relative = 1e-12);

        // Neither side defines the variant
        let groups = table(vec![
            GroupDef::new("x", 1).with_strengths(10.0, 1.0, 1.0),
            GroupDef::new("y", 1).with_strengths(10.0, 2.0, 2.0),
        ]);
        let resolver = PriorityResolver::new(&groups, &lower);
        let (ab, _) = resolve_both(
            &resolver,
            &endpoint(&groups, "x", true),
            &endpoint(&groups, "y", true),
        );
        assert_eq!(ab.unwrap().thresholds.shear_90, None);
    }

    #[test]
    fn same_type_ties_break_by_name() {
        let groups = table(vec![
            GroupDef::new("zeta", 5).with_strengths(1.0, 1.0, 1.0),
            GroupDef::new("alpha", 5).with_strengths(2.0, 2.0, 2.0),
        ]);
        let config = RunConfig::default();
        let resolver = PriorityResolver::new(&groups, &config);
        assert_eq!(
            resolver.governing_group(groups.index_of("zeta"), groups.index_of("alpha")),
            groups.index_of("alpha")
        );
        assert_eq!(
            resolver.governing_group(groups.index_of("alpha"), groups.index_of("zeta")),
            groups.index_of("alpha")
        );
    }

    #[test]
    fn passive_group_anchor() {
        let groups = table(vec![
            GroupDef::new("ground", 0),
            GroupDef::new("wall", 5).with_strengths(10.0, 1.0, 1.0),
        ]);
        let config = RunConfig::default();
        let resolver = PriorityResolver::new(&groups, &config);
        let (ab, ba) = resolve_both(
            &resolver,
            &endpoint(&groups, "ground", false),
            &endpoint(&groups, "wall", true),
        );
        assert_eq!(ab, ba);
        assert_eq!(ab.unwrap().topology_id(), -1);

        let breaking = RunConfig {
            passive_breaking: true,
            ..RunConfig::default()
        };
        let resolver = PriorityResolver::new(&groups, &breaking);
        let r = resolver
            .resolve(
                &endpoint(&groups, "ground", false),
                &endpoint(&groups, "wall", true),
                &contact(0.1),
                &Point3::origin(),
                false,
            )
            .unwrap();
        assert_eq!(r.topology_id(), 5);
        assert_eq!(r.governing, groups.index_of("wall"));
    }

    #[test]
    fn both_passive_groups() {
        let groups = table(vec![GroupDef::new("rubble", 0)]);
        let config = RunConfig::default();
        let resolver = PriorityResolver::new(&groups, &config);

        let (r, _) = resolve_both(
            &resolver,
            &endpoint(&groups, "rubble", true),
            &endpoint(&groups, "rubble", false),
        );
        assert_eq!(r.unwrap().topology_id(), -1);

        let (r, _) = resolve_both(
            &resolver,
            &endpoint(&groups, "rubble", true),
            &endpoint(&groups, "rubble", true),
        );
        assert!(r.is_none());

        let suppressing = RunConfig {
            permanent_collision_suppression: true,
            ..RunConfig::default()
        };
        let resolver = PriorityResolver::new(&groups, &suppressing);
        let (r, _) = resolve_both(
            &resolver,
            &endpoint(&groups, "rubble", true),
            &endpoint(&groups, "rubble", true),
        );
        assert_eq!(r.unwrap().topology_id(), -2);

        let (r, _) = resolve_both(
            &resolver,
            &endpoint(&groups, "rubble", false),
            &endpoint(&groups, "rubble", false),
        );
        assert!(r.is_none());
    }

    #[test]
    fn suppression_only_always_wins() {
        let groups = table(vec![GroupDef::new("wall", 5).with_strengths(10.0, 1.0, 1.0)]);
        let config = RunConfig::default();
        let resolver = PriorityResolver::new(&groups, &config);
        let w = endpoint(&groups, "wall", true);
        let r = resolver
            .resolve(&w, &w, &ContactGeometry::none(), &Point3::origin(), true)
            .unwrap();
        assert_eq!(r.topology_id(), -2);
    }

    #[test]
    fn group_flag_requests_suppression() {
        let groups = table(vec![GroupDef::new("debris", 0).with_flags(GroupFlags {
            permanent_collision_suppression: true,
            ..GroupFlags::default()
        })]);
        let config = RunConfig::default();
        let resolver = PriorityResolver::new(&groups, &config);
        let d = groups.index_of("debris");
        assert!(resolver.suppression_requested(d, groups.index_of("")));
        assert!(!resolver.suppression_requested(groups.index_of(""), groups.index_of("")));
    }

    #[test]
    fn non_finite_threshold_falls_back_to_zero() {
        let mut def = GroupDef::new("odd", 5).with_strengths(1.0, 1.0, 1.0);
        def.compressive = "1 / (a - a)".to_string();
        def.shear = "sqrt(0 - a)".to_string();
        let groups = table(vec![def]);
        let vars = threshold_vars(&contact(0.1), &Point3::origin());
        let t = evaluate(groups.resolve("odd"), &vars);
        assert_eq!(t.compressive, 0.0);
        assert_eq!(t.shear, 0.0);
        assert_relative_eq!(t.tensile, 1.0e5, max_relative = 1e-12);
    }

    #[test]
    fn multiplier_scales_thresholds() {
        let mut def = GroupDef::new("weak", 5).with_strengths(10.0, 1.0, 1.0);
        def.multiplier = 0.5;
        let groups = table(vec![def]);
        let vars = threshold_vars(&contact(0.1), &Point3::origin());
        let t = evaluate(groups.resolve("weak"), &vars);
        assert_relative_eq!(t.compressive, 0.5 * 10.0 * 1.0e5, max_relative = 1e-12);
    }

    #[test]
    fn cylindrical_group_reduces_area() {
        let groups = table(vec![GroupDef::new("column", 5)
            .with_strengths(10.0, 1.0, 1.0)
            .with_flags(GroupFlags {
                cylindrical_section: true,
                ..GroupFlags::default()
            })]);
        let config = RunConfig::default();
        let resolver = PriorityResolver::new(&groups, &config);
        let c = endpoint(&groups, "column", true);
        let r = resolver
            .resolve(&c, &c, &contact(0.1), &Point3::origin(), false)
            .unwrap();
        assert_relative_eq!(r.contact.area, 0.1 * std::f64::consts::FRAC_PI_4, max_relative = 1e-12);
        assert_relative_eq!(
            r.thresholds.compressive,
            10.0 * 1.0e5 * std::f64::consts::FRAC_PI_4,
            max_relative = 1e-9
        );
    }
}
