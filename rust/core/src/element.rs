// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Elements (rigid solids) and their world-space bounding boxes.

use nalgebra::{Point3, Vector3};

use crate::ids::ElementId;

/// Axis-aligned bounding box in world space (meters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Create bounds initialized to an invalid (inverted) state.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    /// Bounds of a point set. Empty input yields [`Aabb::empty`].
    pub fn from_points(points: &[Point3<f64>]) -> Self {
        let mut bounds = Self::empty();
        for p in points {
            bounds.expand(p);
        }
        bounds
    }

    /// Expand bounds to include a point
    #[inline]
    pub fn expand(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Check if bounds are valid (min <= max on every axis)
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Edge lengths along x, y and z.
    #[inline]
    pub fn dimensions(&self) -> Vector3<f64> {
        if !self.is_valid() {
            return Vector3::zeros();
        }
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    #[inline]
    pub fn largest_dimension(&self) -> f64 {
        self.dimensions().max()
    }

    #[inline]
    pub fn half_diagonal(&self) -> f64 {
        self.dimensions().norm() * 0.5
    }

    pub fn volume(&self) -> f64 {
        let d = self.dimensions();
        d.x * d.y * d.z
    }

    /// Returns a copy grown by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vector3::repeat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Per-axis overlap with another box, clamped at zero.
    pub fn overlap_extents(&self, other: &Aabb) -> Vector3<f64> {
        let lo = self.min.sup(&other.min);
        let hi = self.max.inf(&other.max);
        (hi - lo).map(|d| d.max(0.0))
    }

    /// Intersection region, or `None` when the boxes do not overlap on some axis.
    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        let lo = self.min.sup(&other.min);
        let hi = self.max.inf(&other.max);
        if lo.x <= hi.x && lo.y <= hi.y && lo.z <= hi.z {
            Some(Aabb::new(lo, hi))
        } else {
            None
        }
    }

    pub fn intersection_volume(&self, other: &Aabb) -> f64 {
        let d = self.overlap_extents(other);
        d.x * d.y * d.z
    }

    #[inline]
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }
}

/// A rigid solid of the structure model.
///
/// Created by the host before a run and read-only to the pipeline.
/// Faces are optional; they enable the accurate contact-area mode and mesh
/// volume computation.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: ElementId,
    pub name: String,
    /// Name of the governing element group (empty = default group).
    pub group: String,
    /// World-space vertices.
    pub vertices: Vec<Point3<f64>>,
    /// Polygons as vertex-index lists, wound counter-clockwise seen from outside.
    pub faces: Vec<Vec<u32>>,
    pub bounds: Aabb,
    pub centroid: Point3<f64>,
    /// Host-supplied mass in kg. Computed from group density when absent.
    pub mass: Option<f64>,
    /// Host-supplied volume in m³. Computed from faces when absent.
    pub volume: Option<f64>,
    /// Whether the host simulates this element as an active rigid body.
    pub active: bool,
}

impl Element {
    /// Creates an element from world-space vertices. Bounds and centroid are
    /// derived from the vertex set.
    pub fn new(
        id: impl Into<ElementId>,
        name: impl Into<String>,
        group: impl Into<String>,
        vertices: Vec<Point3<f64>>,
    ) -> Self {
        let bounds = Aabb::from_points(&vertices);
        let centroid = if bounds.is_valid() {
            bounds.center()
        } else {
            Point3::origin()
        };
        Self {
            id: id.into(),
            name: name.into(),
            group: group.into(),
            vertices,
            faces: Vec::new(),
            bounds,
            centroid,
            mass: None,
            volume: None,
            active: true,
        }
    }

    /// Creates an axis-aligned box element with its eight corners and six
    /// outward-wound quad faces.
    pub fn cuboid(
        id: impl Into<ElementId>,
        name: impl Into<String>,
        group: impl Into<String>,
        min: Point3<f64>,
        max: Point3<f64>,
    ) -> Self {
        let vertices = vec![
            Point3::new(min.x, min.y, min.z),
            Point3::new(max.x, min.y, min.z),
            Point3::new(max.x, max.y, min.z),
            Point3::new(min.x, max.y, min.z),
            Point3::new(min.x, min.y, max.z),
            Point3::new(max.x, min.y, max.z),
            Point3::new(max.x, max.y, max.z),
            Point3::new(min.x, max.y, max.z),
        ];
        let faces = vec![
            vec![0, 3, 2, 1], // bottom
            vec![4, 5, 6, 7], // top
            vec![0, 1, 5, 4], // front
            vec![2, 3, 7, 6], // back
            vec![0, 4, 7, 3], // left
            vec![1, 2, 6, 5], // right
        ];
        Self::new(id, name, group, vertices).with_faces(faces)
    }

    pub fn with_faces(mut self, faces: Vec<Vec<u32>>) -> Self {
        self.faces = faces;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    #[inline]
    pub fn largest_dimension(&self) -> f64 {
        self.bounds.largest_dimension()
    }

    /// Returns the vertices of one face, skipping out-of-range indices.
    pub fn face_points(&self, face: usize) -> Vec<Point3<f64>> {
        self.faces
            .get(face)
            .map(|f| {
                f.iter()
                    .filter_map(|&i| self.vertices.get(i as usize).copied())
                    .collect()
            })
            .unwrap_or_default()
    }
}
