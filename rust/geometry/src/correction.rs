// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contact-area corrections for non-box cross sections.
//!
//! The box-based contact estimate overstates the area of slender or hollow
//! elements. The volume correction compares an element's real cross section
//! (volume over length) with its bounding-box cross section; the cylindrical
//! correction scales a square section down to its inscribed circle.

use std::f64::consts::FRAC_PI_4;

use rigid_bond_core::{ContactGeometry, Element};

use crate::mesh::element_volume;

/// Per-element volume correction factors, indexed like the element list.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeFactors(Vec<f64>);

impl VolumeFactors {
    /// All factors 1.0.
    pub fn identity(len: usize) -> Self {
        Self(vec![1.0; len])
    }

    pub fn from_vec(factors: Vec<f64>) -> Self {
        Self(factors)
    }

    /// Factor for an element index; 1.0 when out of range.
    pub fn get(&self, index: usize) -> f64 {
        self.0.get(index).copied().unwrap_or(1.0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ratio of solid cross section to box cross section, within (0, 1].
///
/// Elements without volume information or with a flat box keep 1.0.
pub fn volume_correction_factor(element: &Element) -> f64 {
    let Some(volume) = element_volume(element) else {
        return 1.0;
    };
    let dims = element.bounds.dimensions();
    let mut sorted = [dims.x, dims.y, dims.z];
    sorted.sort_by(f64::total_cmp);

    let length = sorted[2];
    let box_section = sorted[0] * sorted[1];
    if !(volume > 0.0 && length > 0.0 && box_section > 0.0) {
        return 1.0;
    }
    (volume / length / box_section).min(1.0)
}

/// Computes the volume correction factor of every element.
pub fn correct_contact_area_by_volume(elements: &[Element]) -> VolumeFactors {
    let factors: Vec<f64> = elements.iter().map(volume_correction_factor).collect();
    let corrected = factors.iter().filter(|&&f| f < 1.0).count();
    tracing::debug!(
        elements = elements.len(),
        corrected,
        "volume correction factors computed"
    );
    VolumeFactors(factors)
}

/// Scales a contact by an area factor. Height and width shrink by the square
/// root so that their product follows the area.
pub fn scale_contact(geometry: &ContactGeometry, factor: f64) -> ContactGeometry {
    let side = factor.max(0.0).sqrt();
    ContactGeometry {
        area: geometry.area * factor.max(0.0),
        height: geometry.height * side,
        width: geometry.width * side,
        ..*geometry
    }
}

/// Area of a circle inscribed in the contact's square section.
pub fn cylindrical_contact(geometry: &ContactGeometry) -> ContactGeometry {
    scale_contact(geometry, FRAC_PI_4)
}

/// Applies the corrections requested for one connection.
///
/// The volume factor is `min(factor_a, factor_b)` and applies when the
/// contact was flagged or the governing group opted in.
pub fn effective_contact(
    geometry: &ContactGeometry,
    factor_a: f64,
    factor_b: f64,
    volume_correction: bool,
    cylindrical: bool,
) -> ContactGeometry {
    let mut out = *geometry;
    if geometry.correction_needed || volume_correction {
        out = scale_contact(&out, factor_a.min(factor_b));
    }
    if cylindrical {
        out = cylindrical_contact(&out);
    }
    out
}
