// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contact-geometry evaluation for element pairs.
//!
//! The estimate works on world-space bounding boxes grown by half the search
//! distance. The per-axis overlap of the grown boxes, minus the search
//! distance, gives the contact dimensions: the thinnest axis is the contact
//! normal, the middle one the height and the largest one the width.
//!
//! Accurate mode first shrinks each box to the faces that lie within the
//! partner's grown box and measures the real face area of the faces facing
//! along the contact normal.

use nalgebra::Point3;
use rayon::prelude::*;
use rigid_bond_core::{Aabb, Axis, ContactGeometry, Element, ElementPair, RunConfig};

use crate::mesh::{faces_within, FaceInfo};

/// Faces within this angle of the contact normal count toward the measured area.
const FACE_ALIGNMENT_DEG: f64 = 25.0;

/// Settings for contact evaluation, taken from the run configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSettings {
    pub search_distance: f64,
    pub accurate: bool,
    /// Elements are treated as surfaces (non-manifold or forced).
    pub surface: bool,
    pub surface_thickness: f64,
}

impl ContactSettings {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            search_distance: config.contact_search_distance(),
            accurate: config.accurate_area,
            surface: config.surface_mode(),
            surface_thickness: config.surface_thickness,
        }
    }
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self::from_config(&RunConfig::default())
    }
}

/// Contact geometry plus the connection location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub geometry: ContactGeometry,
    pub location: Point3<f64>,
}

/// Evaluates the shared surface between two elements.
///
/// Non-overlapping or degenerate pairs return zero area located at the
/// midpoint of the two centroids.
pub fn evaluate_contact(a: &Element, b: &Element, settings: &ContactSettings) -> Contact {
    let fallback = Contact {
        geometry: ContactGeometry::none(),
        location: nalgebra::center(&a.centroid, &b.centroid),
    };
    if !a.bounds.is_valid() || !b.bounds.is_valid() {
        return fallback;
    }

    let half = settings.search_distance * 0.5;
    let mut box_a = a.bounds;
    let mut box_b = b.bounds;
    let mut measured_faces: Option<(Vec<FaceInfo>, Vec<FaceInfo>)> = None;

    if settings.accurate {
        let faces_a = faces_within(a, &b.bounds.expanded(half));
        let faces_b = faces_within(b, &a.bounds.expanded(half));
        if !faces_a.is_empty() && !faces_b.is_empty() {
            box_a = union_bounds(&faces_a);
            box_b = union_bounds(&faces_b);
            measured_faces = Some((faces_a, faces_b));
        }
    }

    let grown_a = box_a.expanded(half);
    let grown_b = box_b.expanded(half);
    let region = match grown_a.intersection(&grown_b) {
        Some(region) => region,
        None => return fallback,
    };
    let location = region.center();

    let overlap = grown_a.overlap_extents(&grown_b);
    let dims = overlap.map(|d| (d - settings.search_distance).max(0.0));

    // Ascending by contact dimension, ties in axis order
    let mut axes = Axis::ALL;
    axes.sort_by(|l, r| dims[l.index()].total_cmp(&dims[r.index()]));
    let [axis_normal, axis_height, axis_width] = axes;
    let height = dims[axis_height.index()];
    let width = dims[axis_width.index()];

    let face_box_area = if settings.surface {
        2.0 * (height + width) * settings.surface_thickness
    } else {
        height * width
    };
    let mut area = if settings.surface {
        face_box_area
    } else {
        dims.x * dims.y + dims.y * dims.z + dims.z * dims.x
    };

    let mut correction_needed = false;
    if let Some((faces_a, faces_b)) = &measured_faces {
        let measured = aligned_area(faces_a, axis_normal).min(aligned_area(faces_b, axis_normal));
        if measured > 0.0 && measured <= face_box_area {
            area = area.min(measured);
        } else {
            tracing::debug!(
                a = %a.id,
                b = %b.id,
                measured,
                estimate = face_box_area,
                "face-measured contact area rejected"
            );
            correction_needed = true;
        }
    }

    Contact {
        geometry: ContactGeometry {
            area: area.max(0.0),
            height,
            width,
            axis_normal,
            axis_height,
            axis_width,
            correction_needed,
        },
        location,
    }
}

/// Evaluates many pairs on the rayon pool. Results are in input order.
///
/// Pair ids index into `elements`.
pub fn evaluate_pairs(
    elements: &[Element],
    pairs: &[ElementPair],
    settings: &ContactSettings,
) -> Vec<Contact> {
    pairs
        .par_iter()
        .map(|pair| {
            evaluate_contact(
                &elements[pair.a().index()],
                &elements[pair.b().index()],
                settings,
            )
        })
        .collect()
}

fn union_bounds(faces: &[FaceInfo]) -> Aabb {
    let mut bounds = Aabb::empty();
    for face in faces {
        bounds.expand(&face.bounds.min);
        bounds.expand(&face.bounds.max);
    }
    bounds
}

fn aligned_area(faces: &[FaceInfo], axis: Axis) -> f64 {
    let min_cos = FACE_ALIGNMENT_DEG.to_radians().cos();
    faces
        .iter()
        .filter(|f| {
            f.normal
                .map(|n| n.dot(&axis.unit()).abs() >= min_cos)
                .unwrap_or(false)
        })
        .map(|f| f.area)
        .sum()
}
