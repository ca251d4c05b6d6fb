// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Constraint synthesis.
//!
//! Expands a resolved connection into one [`ConstraintSpec`] per slot of its
//! connection type. Locks come from the slot roles, thresholds from the
//! resolved real-world values converted to solver impulses, and the
//! orientation from the element centroids or the contact normal.

use nalgebra::{Point3, Rotation3, UnitQuaternion, Vector3};
use rigid_bond_core::topology::{lookup, Topology};
use rigid_bond_core::units::to_impulse;
use rigid_bond_core::{
    ConstraintKey, ContactGeometry, ElementGroup, ElementPair, JointKind, Role, RunConfig,
    SlotTemplate, ToleranceSet,
};
use serde::Serialize;
use slotmap::SlotMap;

use crate::connection::{ConnectionSet, SlotKeys};
use crate::priority::{Resolution, Thresholds};

/// Spring damping applied to every plastic slot.
pub const SPRING_DAMPING: f64 = 0.5;

/// Limit of one degree of freedom in the constraint frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AxisLimit {
    Free,
    Locked,
    Limited { lower: f64, upper: f64 },
}

/// Spring parameters of a plastic slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpringParams {
    pub stiffness: f64,
    pub damping: f64,
}

/// One physics joint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintSpec {
    #[serde(serialize_with = "serialize_pair")]
    pub pair: ElementPair,
    /// Position of the slot within its connection.
    pub slot: usize,
    pub topology_id: i32,
    pub kind: JointKind,
    /// Limits along local X, Y, Z.
    pub linear: [AxisLimit; 3],
    /// Limits about local X, Y, Z.
    pub angular: [AxisLimit; 3],
    /// Breaking impulse; `None` never breaks.
    pub breaking_threshold: Option<f64>,
    #[serde(serialize_with = "serialize_quaternion")]
    pub orientation: UnitQuaternion<f64>,
    #[serde(serialize_with = "serialize_point")]
    pub location: Point3<f64>,
    pub spring: Option<SpringParams>,
    pub enabled: bool,
    pub disable_collisions: bool,
    pub tolerances: ToleranceSet,
}

fn serialize_pair<S: serde::Serializer>(p: &ElementPair, s: S) -> Result<S::Ok, S::Error> {
    [p.a().0, p.b().0].serialize(s)
}

fn serialize_quaternion<S: serde::Serializer>(
    q: &UnitQuaternion<f64>,
    s: S,
) -> Result<S::Ok, S::Error> {
    [q.w, q.i, q.j, q.k].serialize(s)
}

fn serialize_point<S: serde::Serializer>(p: &Point3<f64>, s: S) -> Result<S::Ok, S::Error> {
    [p.x, p.y, p.z].serialize(s)
}

/// All synthesized constraints, keyed for the host.
#[derive(Debug, Clone, Default)]
pub struct SynthesisOutput {
    pub constraints: SlotMap<ConstraintKey, ConstraintSpec>,
    pub integrity_warnings: usize,
}

impl SynthesisOutput {
    /// Stores the specs of one connection and returns their keys in slot order.
    pub fn insert_all(&mut self, specs: Vec<ConstraintSpec>) -> SlotKeys {
        specs.into_iter().map(|s| self.constraints.insert(s)).collect()
    }

    pub fn get(&self, key: ConstraintKey) -> Option<&ConstraintSpec> {
        self.constraints.get(key)
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Specs in creation order.
    pub fn specs(&self) -> Vec<&ConstraintSpec> {
        self.constraints.values().collect()
    }
}

/// Checks every connection against its constraints: the slot count must match
/// the connection type and every slot must join the connection's pair.
/// Returns the number of violations; each is logged.
pub fn check_integrity(connections: &ConnectionSet, output: &SynthesisOutput) -> usize {
    let mut warnings = 0;
    for (_, connection) in connections.iter() {
        let specs: Vec<&ConstraintSpec> = connection
            .slots
            .iter()
            .filter_map(|&k| output.get(k))
            .collect();
        let expected = specs
            .first()
            .and_then(|s| lookup(s.topology_id))
            .map(Topology::slot_count);
        if specs.len() != connection.slots.len() || expected != Some(specs.len()) {
            tracing::warn!(
                pair = ?connection.pair,
                slots = connection.slots.len(),
                expected = ?expected,
                "connection slot count does not match its type"
            );
            warnings += 1;
        }
        if specs.iter().any(|s| s.pair != connection.pair) {
            tracing::warn!(pair = ?connection.pair, "constraint joins a different pair");
            warnings += 1;
        }
    }
    warnings
}

/// Per-connection inputs of the synthesizer.
pub struct SlotInput<'a> {
    pub pair: ElementPair,
    pub location: Point3<f64>,
    pub centroid_a: Point3<f64>,
    pub centroid_b: Point3<f64>,
    pub resolution: &'a Resolution,
    pub group: &'a ElementGroup,
}

/// Synthesizes the slots of one connection.
pub fn synthesize(input: &SlotInput<'_>, config: &RunConfig) -> Vec<ConstraintSpec> {
    let topology = input.resolution.topology;
    let orientation = orientation(
        &input.centroid_a,
        &input.centroid_b,
        &input.resolution.contact,
        config,
    );
    let special = topology.is_special();

    topology
        .slots
        .iter()
        .enumerate()
        .map(|(slot, template)| {
            let (linear, angular) = slot_limits(template, topology);
            let real = slot_threshold(template, &input.resolution.thresholds);
            let correction = template.geometry_correction();
            let breaking_threshold = if special {
                None
            } else {
                Some(to_impulse(
                    real,
                    correction,
                    topology.slot_count(),
                    config.steps_per_second,
                    config.time_scale,
                ))
            };
            let spring = (template.kind == JointKind::GenericSpring).then(|| SpringParams {
                stiffness: spring_stiffness(
                    input.resolution.thresholds.plastic,
                    input.group,
                    correction,
                    topology.slot_count(),
                    config,
                ),
                damping: SPRING_DAMPING,
            });
            let enabled = !(spring.is_some() && config.plastic_springs_start_disabled);

            ConstraintSpec {
                pair: input.pair,
                slot,
                topology_id: topology.id,
                kind: template.kind,
                linear,
                angular,
                breaking_threshold,
                orientation,
                location: input.location,
                spring,
                enabled,
                // Joined elements never collide with each other
                disable_collisions: true,
                tolerances: input.group.tolerances,
            }
        })
        .collect()
}

/// Real-world threshold of a slot: the weakest of its roles.
///
/// Spring slots ignore their plastic role unless it is the only one.
pub fn slot_threshold(template: &SlotTemplate, t: &Thresholds) -> f64 {
    let value = |role: Role| match role {
        Role::Compressive => t.compressive,
        Role::Tensile => t.tensile,
        Role::Shear => t.shear,
        Role::Shear90 => t.shear_90.unwrap_or(t.shear),
        Role::Bend | Role::Torsion => t.bend,
        Role::Bend90 => t.bend_90.unwrap_or(t.bend),
        Role::Plastic => t.plastic,
    };
    let skip_plastic = template.kind == JointKind::GenericSpring
        && template.roles.iter().any(|&r| r != Role::Plastic);
    template
        .roles
        .iter()
        .filter(|&&r| !(skip_plastic && r == Role::Plastic))
        .map(|&r| value(r))
        .reduce(f64::min)
        .unwrap_or(0.0)
}

/// Linear and angular limits of a slot.
pub fn slot_limits(template: &SlotTemplate, topology: &Topology) -> ([AxisLimit; 3], [AxisLimit; 3]) {
    use AxisLimit::{Free, Limited, Locked};

    match template.kind {
        JointKind::Fixed => return ([Locked; 3], [Locked; 3]),
        JointKind::Point => return ([Locked; 3], [Free; 3]),
        JointKind::Hinge => return ([Locked; 3], [Locked, Locked, Free]),
        JointKind::Generic | JointKind::GenericSpring => {}
    }

    // A plastic-only spring holds every axis
    if !template.roles.is_empty() && template.roles.iter().all(|&r| r == Role::Plastic) {
        return ([Locked; 3], [Locked; 3]);
    }

    let mut linear = [Free; 3];
    let mut angular = [Free; 3];
    let has = |r: Role| template.has_role(r);

    linear[0] = match (has(Role::Compressive), has(Role::Tensile)) {
        (true, true) => Locked,
        (true, false) => Limited {
            lower: 0.0,
            upper: f64::INFINITY,
        },
        (false, true) => Limited {
            lower: f64::NEG_INFINITY,
            upper: 0.0,
        },
        (false, false) => Free,
    };
    if has(Role::Shear) {
        linear[1] = Locked;
        if !topology.has_role(Role::Shear90) {
            linear[2] = Locked;
        }
    }
    if has(Role::Shear90) {
        linear[2] = Locked;
    }
    if has(Role::Bend) {
        angular[1] = Locked;
        if !topology.has_role(Role::Bend90) {
            angular[2] = Locked;
        }
        if !topology.has_role(Role::Torsion) {
            angular[0] = Locked;
        }
    }
    if has(Role::Bend90) {
        angular[2] = Locked;
    }
    if has(Role::Torsion) {
        angular[0] = Locked;
    }
    (linear, angular)
}

/// Spring stiffness of a plastic slot.
pub fn spring_stiffness(
    plastic: f64,
    group: &ElementGroup,
    correction: f64,
    slot_count: usize,
    config: &RunConfig,
) -> f64 {
    let span = group.spring_length * group.tolerances.plastic.distance;
    if span.is_nan() || span <= 0.0 {
        tracing::warn!(
            group = %group.name,
            spring_length = group.spring_length,
            tolerance = group.tolerances.plastic.distance,
            "spring length or plastic tolerance is zero, using zero stiffness"
        );
        return 0.0;
    }
    let stiffness = plastic / span * correction / slot_count.max(1) as f64;
    if config.halve_spring_stiffness {
        stiffness * 0.5
    } else {
        stiffness
    }
}

/// Constraint frame: local X along the connection direction, local Y toward
/// the contact height axis.
pub fn orientation(
    centroid_a: &Point3<f64>,
    centroid_b: &Point3<f64>,
    contact: &ContactGeometry,
    config: &RunConfig,
) -> UnitQuaternion<f64> {
    let raw = centroid_b - centroid_a;
    let normal = contact.axis_normal.unit();

    let x = if config.snap_to_area_orientation {
        if raw.dot(&normal) < 0.0 {
            -normal
        } else {
            normal
        }
    } else {
        let keep = 1.0 - config.align_vertical;
        let scaled = Vector3::new(raw.x * keep, raw.y * keep, raw.z);
        [scaled, raw, normal]
            .into_iter()
            .find_map(|v| v.try_normalize(1.0e-12))
            .unwrap_or(normal)
    };

    let height = contact.axis_height.unit();
    let y = [height, contact.axis_width.unit(), contact.axis_normal.unit()]
        .into_iter()
        .find_map(|v| (v - x * x.dot(&v)).try_normalize(1.0e-6))
        .unwrap_or_else(Vector3::y);
    let z = x.cross(&y);

    UnitQuaternion::from_rotation_matrix(&Rotation3::from_basis_unchecked(&[x, y, z]))
}
