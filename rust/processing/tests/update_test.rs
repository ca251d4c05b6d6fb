// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Update mode against cached connections, and resolver symmetry.

use rigid_bond_core::{
    Axis, ContactGeometry, Element, ElementId, GroupDef, GroupFlags, GroupTable, Point3,
    RunConfig,
};
use rigid_bond_processing::{ConnectionCache, Endpoint, Error, Pipeline, PriorityResolver};
use rustc_hash::FxHashSet;

fn column(groups: &[&str]) -> Vec<Element> {
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let z = i as f64 * 0.5;
            Element::cuboid(
                i,
                format!("block{}", i),
                *group,
                Point3::new(0.0, 0.0, z),
                Point3::new(0.3, 0.3, z + 0.5),
            )
        })
        .collect()
}

fn table(concrete_type: i32) -> GroupTable {
    GroupTable::new(
        &[
            GroupDef::new("concrete", concrete_type).with_strengths(30.0, 3.0, 4.0),
            GroupDef::new("steel", 6)
                .with_strengths(200.0, 200.0, 120.0)
                .with_priority(1),
        ],
        100,
    )
    .unwrap()
}

fn pipeline(concrete_type: i32) -> Pipeline {
    let config = RunConfig {
        search_distance: 0.01,
        cluster_radius: 0.1,
        ..RunConfig::default()
    };
    Pipeline::new(config, table(concrete_type)).unwrap()
}

#[test]
fn update_reproduces_full_run() {
    let elements = column(&["concrete", "concrete", "steel", "concrete"]);
    let pipeline = pipeline(7);
    let full = pipeline.run(&elements, &FxHashSet::default()).unwrap();

    let updated = pipeline.update(&elements, &full.cache()).unwrap();
    assert_eq!(updated.constraint_specs(), full.constraint_specs());
    assert_eq!(updated.diagnostics, full.diagnostics);
    assert_eq!(updated.report.integrity_warnings, 0);
    assert_eq!(updated.report.missing_references, 0);

    // A second update changes nothing
    let again = pipeline.update(&elements, &updated.cache()).unwrap();
    assert_eq!(again.constraint_specs(), full.constraint_specs());
}

#[test]
fn update_survives_json_roundtrip() {
    let elements = column(&["concrete", "steel", "steel"]);
    let pipeline = pipeline(1);
    let full = pipeline.run(&elements, &FxHashSet::default()).unwrap();

    let json = full.cache().to_json().unwrap();
    let cache = ConnectionCache::from_json(&json).unwrap();
    let updated = pipeline.update(&elements, &cache).unwrap();
    assert_eq!(updated.constraint_specs(), full.constraint_specs());
}

#[test]
fn update_applies_new_group_configuration() {
    let elements = column(&["concrete", "concrete", "concrete"]);
    let full = pipeline(1).run(&elements, &FxHashSet::default()).unwrap();
    assert_eq!(full.synthesis.len(), 2);

    // Switching the type re-synthesizes without searching; slot counts differ
    let updated = pipeline(8).update(&elements, &full.cache()).unwrap();
    assert_eq!(updated.report.candidates, 0);
    assert_eq!(updated.synthesis.len(), 2 * 4);
    assert_eq!(updated.report.integrity_warnings, 2);
    assert!(updated.constraint_specs().iter().all(|s| s.topology_id == 8));
}

#[test]
fn update_skips_missing_elements() {
    let elements = column(&["concrete", "concrete", "concrete"]);
    let pipeline = pipeline(1);
    let full = pipeline.run(&elements, &FxHashSet::default()).unwrap();

    let updated = pipeline.update(&elements[..2], &full.cache()).unwrap();
    assert_eq!(updated.report.missing_references, 1);
    assert_eq!(updated.connections.len(), 1);
}

#[test]
fn update_rejects_empty_input() {
    let elements = column(&["concrete", "concrete"]);
    let pipeline = pipeline(1);
    let cache = pipeline
        .run(&elements, &FxHashSet::default())
        .unwrap()
        .cache();
    assert!(matches!(pipeline.update(&[], &cache), Err(Error::NoElements)));
}

#[test]
fn resolution_is_symmetric() {
    let groups = GroupTable::new(
        &[
            GroupDef::new("a", 1).with_strengths(10.0, 1.0, 2.0),
            GroupDef::new("b", 6).with_strengths(5.0, 2.0, 1.0),
            GroupDef::new("c", 5)
                .with_strengths(8.0, 0.5, 3.0)
                .with_priority(2),
            GroupDef::new("p", 0).with_flags(GroupFlags {
                permanent_collision_suppression: true,
                ..GroupFlags::default()
            }),
        ],
        100,
    )
    .unwrap();
    let contact = ContactGeometry {
        area: 0.04,
        height: 0.1,
        width: 0.4,
        axis_normal: Axis::Z,
        axis_height: Axis::Y,
        axis_width: Axis::X,
        correction_needed: false,
    };
    let location = Point3::new(1.0, 2.0, 3.0);
    let names = ["", "a", "b", "c", "p"];

    for prefer_lower in [true, false] {
        for passive_breaking in [true, false] {
            let config = RunConfig {
                prefer_lower_threshold: prefer_lower,
                passive_breaking,
                ..RunConfig::default()
            };
            let resolver = PriorityResolver::new(&groups, &config);
            for x in names {
                for y in names {
                    for (ax, ay) in [(true, true), (true, false), (false, false)] {
                        let ex = Endpoint {
                            group: groups.index_of(x),
                            active: ax,
                            volume_factor: 1.0,
                        };
                        let ey = Endpoint {
                            group: groups.index_of(y),
                            active: ay,
                            volume_factor: 0.8,
                        };
                        assert_eq!(
                            resolver.resolve(&ex, &ey, &contact, &location, false),
                            resolver.resolve(&ey, &ex, &contact, &location, false),
                            "{} / {}",
                            x,
                            y
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn reordered_ids_are_rejected() {
    let mut elements = column(&["concrete", "concrete"]);
    elements.swap(0, 1);
    let err = pipeline(1)
        .run(&elements, &FxHashSet::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ElementOrder {
            position: 0,
            id: ElementId(1)
        }
    ));
}
