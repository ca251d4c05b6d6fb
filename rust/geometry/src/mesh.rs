// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon and polyhedron measures on element meshes.

use nalgebra::{Point3, Vector3};
use rigid_bond_core::{Aabb, Element};

/// Computes a polygon normal using Newell's method.
///
/// Works for any planar polygon (convex or concave). The normal direction
/// follows the right-hand rule relative to the vertex winding order.
pub fn polygon_normal(points: &[Point3<f64>]) -> Option<Vector3<f64>> {
    if points.len() < 3 {
        return None;
    }

    let mut normal = Vector3::new(0.0, 0.0, 0.0);
    let n = points.len();
    for i in 0..n {
        let curr = points[i];
        let next = points[(i + 1) % n];
        normal.x += (curr.y - next.y) * (curr.z + next.z);
        normal.y += (curr.z - next.z) * (curr.x + next.x);
        normal.z += (curr.x - next.x) * (curr.y + next.y);
    }

    let len = normal.norm();
    if len < 1e-15 {
        return None; // degenerate face
    }
    Some(normal / len)
}

/// Area of a planar polygon from the cross-product triangle fan.
pub fn polygon_area(points: &[Point3<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let p0 = points[0];
    let mut total = Vector3::new(0.0, 0.0, 0.0);
    for i in 1..points.len() - 1 {
        total += (points[i] - p0).cross(&(points[i + 1] - p0));
    }
    total.norm() / 2.0
}

/// Volume of a closed polyhedral mesh using signed tetrahedra against the
/// origin. Returns `None` when the element has no faces.
pub fn mesh_volume(element: &Element) -> Option<f64> {
    if element.faces.is_empty() {
        return None;
    }

    let mut volume = 0.0;
    for face in 0..element.faces.len() {
        let verts = element.face_points(face);
        if verts.len() < 3 {
            continue;
        }
        let p0 = verts[0];
        for i in 1..verts.len() - 1 {
            volume += p0.coords.dot(&verts[i].coords.cross(&verts[i + 1].coords));
        }
    }
    Some((volume / 6.0).abs())
}

/// Host-supplied volume, else the mesh volume.
pub fn element_volume(element: &Element) -> Option<f64> {
    element.volume.or_else(|| mesh_volume(element))
}

/// A face of an element with its measures.
#[derive(Debug, Clone)]
pub struct FaceInfo {
    pub index: usize,
    pub bounds: Aabb,
    pub area: f64,
    pub normal: Option<Vector3<f64>>,
}

/// Faces whose vertices all lie inside `region`.
pub fn faces_within(element: &Element, region: &Aabb) -> Vec<FaceInfo> {
    (0..element.faces.len())
        .filter_map(|index| {
            let points = element.face_points(index);
            if points.len() < 3 || !points.iter().all(|p| region.contains(p)) {
                return None;
            }
            Some(FaceInfo {
                index,
                bounds: Aabb::from_points(&points),
                area: polygon_area(&points),
                normal: polygon_normal(&points),
            })
        })
        .collect()
}
