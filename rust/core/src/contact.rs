// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contact-geometry record attached to every connection.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::ElementId;

/// Contact areas below this value (m²) count as no contact.
pub const AREA_EPSILON: f64 = 1.0e-4;

/// World axis identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn unit(self) -> Vector3<f64> {
        match self {
            Axis::X => Vector3::x(),
            Axis::Y => Vector3::y(),
            Axis::Z => Vector3::z(),
        }
    }
}

/// Shared-surface estimate between two elements.
///
/// `height` and `width` are in meters and `area` in m². The normal axis is the
/// direction of least overlap, height the middle one and width the largest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactGeometry {
    pub area: f64,
    pub height: f64,
    pub width: f64,
    pub axis_normal: Axis,
    pub axis_height: Axis,
    pub axis_width: Axis,
    /// Set when a face-measured area was rejected and the box estimate should
    /// later be scaled by the volume-based correction.
    pub correction_needed: bool,
}

impl ContactGeometry {
    /// Zero-area placeholder for non-overlapping or degenerate pairs.
    pub fn none() -> Self {
        Self {
            area: 0.0,
            height: 0.0,
            width: 0.0,
            axis_normal: Axis::Z,
            axis_height: Axis::X,
            axis_width: Axis::Y,
            correction_needed: false,
        }
    }

    #[inline]
    pub fn has_contact(&self) -> bool {
        self.area >= AREA_EPSILON
    }

    /// Validates the record for the pair `(a, b)`.
    pub fn check(&self, a: ElementId, b: ElementId) -> Result<()> {
        if self.area.is_finite() && self.area >= AREA_EPSILON {
            Ok(())
        } else {
            Err(Error::GeometryDegenerate(a, b))
        }
    }
}

impl Default for ContactGeometry {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_units() {
        assert_eq!(Axis::X.unit(), Vector3::x());
        assert_eq!(Axis::Z.index(), 2);
    }

    #[test]
    fn placeholder_has_no_contact() {
        let g = ContactGeometry::none();
        assert!(!g.has_contact());
        assert!(matches!(
            g.check(ElementId(0), ElementId(1)),
            Err(Error::GeometryDegenerate(ElementId(0), ElementId(1)))
        ));
    }
}
