// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end runs over small hand-built structures.

use approx::assert_relative_eq;
use rigid_bond_core::topology::lookup;
use rigid_bond_core::{
    Element, ElementId, ElementPair, GroupDef, GroupFlags, GroupTable, JointKind, Point3,
    RunConfig, AREA_EPSILON,
};
use rigid_bond_processing::{AxisLimit, Pipeline, RunOutput};
use rustc_hash::FxHashSet;
use tracing_subscriber::EnvFilter;

const BRICK: [f64; 3] = [0.4, 0.2, 0.1];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn cuboid(id: usize, group: &str, min: [f64; 3], max: [f64; 3]) -> Element {
    Element::cuboid(
        id,
        format!("e{}", id),
        group,
        Point3::new(min[0], min[1], min[2]),
        Point3::new(max[0], max[1], max[2]),
    )
}

/// Three courses of four bricks in running bond, starting at `base` id.
fn wall(elements: &mut Vec<Element>) {
    for course in 0..3 {
        let offset = if course % 2 == 1 { BRICK[0] * 0.5 } else { 0.0 };
        for i in 0..4 {
            let x = offset + i as f64 * BRICK[0];
            let z = course as f64 * BRICK[2];
            let id = elements.len();
            elements.push(cuboid(
                id,
                "masonry",
                [x, 0.0, z],
                [x + BRICK[0], BRICK[1], z + BRICK[2]],
            ));
        }
    }
}

fn groups() -> GroupTable {
    GroupTable::new(
        &[
            GroupDef::new("masonry", 1).with_strengths(10.0, 0.5, 1.0),
            GroupDef::new("ground", 0),
        ],
        100,
    )
    .unwrap()
}

fn config() -> RunConfig {
    RunConfig {
        search_distance: 0.01,
        mesh_search_distance: 0.01,
        ..RunConfig::default()
    }
}

fn run(elements: &[Element], config: RunConfig, groups: GroupTable) -> RunOutput {
    init_tracing();
    Pipeline::new(config, groups)
        .unwrap()
        .run(elements, &FxHashSet::default())
        .unwrap()
}

#[test]
fn wall_connections_hold_invariants() {
    let mut elements = Vec::new();
    wall(&mut elements);
    let output = run(&elements, config(), groups());

    let pairs: Vec<ElementPair> = output.connections.iter().map(|(_, c)| c.pair).collect();
    assert_eq!(pairs.len(), 3 * 3 + 2 * 7);
    assert!(pairs.iter().all(|p| p.a() < p.b()));
    let unique: FxHashSet<ElementPair> = pairs.iter().copied().collect();
    assert_eq!(unique.len(), pairs.len());

    for (_, connection) in output.connections.iter() {
        assert!(connection.contact.area >= 0.0);
        assert!(connection.contact.area > AREA_EPSILON || connection.suppression_only);
    }

    for (pair, specs) in output.constraints_by_connection() {
        assert_eq!(specs.len(), 1, "{:?}", pair);
        assert_eq!(specs[0].kind, JointKind::Fixed);
        assert!(specs[0].breaking_threshold.unwrap() > 0.0);
    }
    assert_eq!(output.report.integrity_warnings, 0);
    assert_eq!(output.diagnostics.len(), output.connections.len());
}

#[test]
fn head_joint_breaks_before_bed_joint() {
    let mut elements = Vec::new();
    wall(&mut elements);
    let output = run(&elements, config(), groups());

    let threshold = |a: usize, b: usize| {
        let pair = ElementPair::new(ElementId::from(a), ElementId::from(b)).unwrap();
        output
            .constraint_specs()
            .into_iter()
            .find(|s| s.pair == pair)
            .and_then(|s| s.breaking_threshold)
            .unwrap()
    };
    // Head joint 0.2 x 0.1 against bed joint 0.2 x 0.2
    assert!(threshold(0, 1) < threshold(0, 4));
}

#[test]
fn passive_ground_anchors_first_course() {
    let mut elements = vec![cuboid(0, "ground", [-0.1, 0.0, -0.2], [1.7, 0.2, 0.0]).with_active(false)];
    wall(&mut elements);
    let output = run(&elements, config(), groups());

    let anchored: Vec<_> = output
        .constraint_specs()
        .into_iter()
        .filter(|s| s.pair.a() == ElementId(0))
        .collect();
    assert_eq!(anchored.len(), 4);
    for spec in anchored {
        assert_eq!(spec.topology_id, -1);
        assert_eq!(spec.kind, JointKind::Fixed);
        assert_eq!(spec.breaking_threshold, None);
    }
}

#[test]
fn passive_breaking_uses_the_active_group() {
    let mut elements = vec![cuboid(0, "ground", [-0.1, 0.0, -0.2], [1.7, 0.2, 0.0]).with_active(false)];
    wall(&mut elements);
    let cfg = RunConfig {
        passive_breaking: true,
        ..config()
    };
    let output = run(&elements, cfg, groups());
    let spec = output
        .constraint_specs()
        .into_iter()
        .find(|s| s.pair.a() == ElementId(0))
        .unwrap();
    assert_eq!(spec.topology_id, 1);
    assert!(spec.breaking_threshold.is_some());
}

#[test]
fn undersized_element_becomes_child() {
    let elements = vec![
        cuboid(0, "masonry", [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]),
        cuboid(1, "masonry", [1.0, 0.0, 0.0], [1.05, 0.05, 0.05]),
    ];
    let cfg = RunConfig {
        search_distance: 0.02,
        minimum_element_size: 0.1,
        ..RunConfig::default()
    };
    let output = run(&elements, cfg, groups());

    assert!(output.connections.is_empty());
    assert_eq!(output.reparent.parent_of(ElementId(1)), Some(ElementId(0)));
    assert_eq!(output.report.filter.reparented_removed, 1);
    let (parent, mass) = output.reparent.parent_masses[0];
    assert_eq!(parent, ElementId(0));
    assert_relative_eq!(mass, 2400.0 + 2400.0 * 0.05 * 0.05 * 0.05, max_relative = 1e-9);
}

#[test]
fn two_undersized_elements_connect_normally() {
    let elements = vec![
        cuboid(0, "masonry", [0.0, 0.0, 0.0], [0.05, 0.05, 0.05]),
        cuboid(1, "masonry", [0.05, 0.0, 0.0], [0.1, 0.05, 0.05]),
    ];
    let cfg = RunConfig {
        search_distance: 0.02,
        minimum_element_size: 0.1,
        ..RunConfig::default()
    };
    let output = run(&elements, cfg, groups());

    assert!(output.reparent.is_empty());
    assert_eq!(output.connections.len(), 1);
    assert_eq!(output.constraint_specs()[0].topology_id, 1);
}

#[test]
fn edge_contact_is_kept_for_collision_suppression() {
    let table = GroupTable::new(
        &[GroupDef::new("glass", 1)
            .with_strengths(10.0, 1.0, 1.0)
            .with_flags(GroupFlags {
                permanent_collision_suppression: true,
                ..GroupFlags::default()
            })],
        100,
    )
    .unwrap();
    let elements = vec![
        cuboid(0, "glass", [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]),
        cuboid(1, "glass", [1.0, 0.0, 1.0], [2.0, 1.0, 2.0]),
    ];
    let output = run(&elements, config(), table.clone());

    assert_eq!(output.report.filter.suppression_kept, 1);
    let (_, connection) = output.connections.iter().next().unwrap();
    assert!(connection.suppression_only);
    assert_eq!(connection.contact.area, 0.0);

    let specs = output.constraint_specs();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].topology_id, -2);
    assert_eq!(specs[0].linear, [AxisLimit::Free; 3]);
    assert_eq!(specs[0].breaking_threshold, None);
    assert!(specs[0].disable_collisions);

    // Without the flag the edge contact disappears
    let plain = GroupTable::new(&[GroupDef::new("glass", 1).with_strengths(10.0, 1.0, 1.0)], 100).unwrap();
    let output = run(&elements, config(), plain);
    assert!(output.connections.is_empty());
    assert_eq!(output.report.filter.zero_area_removed, 1);
}

#[test]
fn no_cross_group_rule() {
    let table = GroupTable::new(
        &[
            GroupDef::new("masonry", 1).with_strengths(10.0, 0.5, 1.0),
            GroupDef::new("timber", 1)
                .with_strengths(20.0, 10.0, 2.0)
                .with_flags(GroupFlags {
                    no_cross_group: true,
                    ..GroupFlags::default()
                }),
        ],
        100,
    )
    .unwrap();
    let elements = vec![
        cuboid(0, "masonry", [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]),
        cuboid(1, "timber", [0.0, 0.0, 1.0], [1.0, 1.0, 2.0]),
        cuboid(2, "timber", [0.0, 0.0, 2.0], [1.0, 1.0, 3.0]),
    ];
    let output = run(&elements, config(), table);
    let pairs: Vec<ElementPair> = output.connections.iter().map(|(_, c)| c.pair).collect();
    assert_eq!(pairs, vec![ElementPair::new(ElementId(1), ElementId(2)).unwrap()]);
    assert_eq!(output.report.filter.cross_group_removed, 1);
}

#[test]
fn clustering_reaches_fixed_point() {
    let mut elements = Vec::new();
    wall(&mut elements);
    let radius = 0.3;
    let cfg = RunConfig {
        cluster_radius: radius,
        ..config()
    };
    let output = run(&elements, cfg, groups());
    let report = &output.report.cluster;

    assert!(report.passes >= 1);
    assert!(report.passes <= report.initial_distinct + 1);
    assert!(report.distinct_per_pass.windows(2).all(|w| w[1] <= w[0]));

    let mut distinct: Vec<Point3<f64>> = Vec::new();
    for (_, connection) in output.connections.iter() {
        if !distinct.contains(&connection.location) {
            distinct.push(connection.location);
        }
    }
    assert!(distinct.len() < output.connections.len());
    for (i, p) in distinct.iter().enumerate() {
        for q in &distinct[i + 1..] {
            assert!((p - q).norm() >= radius);
        }
    }
    // Constraints follow their clustered connection
    for (_, connection) in output.connections.iter() {
        for &key in &connection.slots {
            assert_eq!(output.synthesis.get(key).unwrap().location, connection.location);
        }
    }
}

#[test]
fn slot_counts_match_connection_types() {
    let table = GroupTable::new(
        &[GroupDef::new("masonry", 19).with_strengths(10.0, 0.5, 1.0)],
        100,
    )
    .unwrap();
    let mut elements = Vec::new();
    wall(&mut elements);
    let output = run(&elements, config(), table);

    let expected = lookup(19).unwrap().slot_count();
    for (_, connection) in output.connections.iter() {
        assert_eq!(connection.slots.len(), expected);
    }
    assert_eq!(output.synthesis.len(), expected * output.connections.len());
    let springs = output
        .constraint_specs()
        .into_iter()
        .filter(|s| s.spring.is_some())
        .count();
    assert_eq!(springs, 3 * output.connections.len());
}

#[test]
fn connection_count_limit_caps_each_element() {
    let mut elements = Vec::new();
    for z in 0..3 {
        for y in 0..3 {
            for x in 0..3 {
                let min = [x as f64, y as f64, z as f64];
                let id = elements.len();
                elements.push(cuboid(id, "masonry", min, [min[0] + 1.0, min[1] + 1.0, min[2] + 1.0]));
            }
        }
    }
    let unlimited = run(&elements, config(), groups());
    assert_eq!(unlimited.connections.len(), 3 * 3 * 2 * 3);

    let limit = 2;
    let cfg = RunConfig {
        connection_count_limit: limit,
        ..config()
    };
    let output = run(&elements, cfg, groups());
    assert!(!output.connections.is_empty());
    assert!(output.connections.len() < unlimited.connections.len());

    let mut counts = vec![0usize; elements.len()];
    let mut unique = FxHashSet::default();
    for (_, connection) in output.connections.iter() {
        assert!(unique.insert(connection.pair));
        counts[connection.pair.a().index()] += 1;
        counts[connection.pair.b().index()] += 1;
    }
    assert!(counts.iter().all(|&n| n <= limit), "{:?}", counts);
    assert!(counts.iter().any(|&n| n == limit));
}
