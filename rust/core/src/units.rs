// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unit conversion between scene units, formula units and solver impulses.
//!
//! Scene geometry is in meters. Threshold formulas receive millimeters
//! (strengths are quoted in N/mm²) and return Newtons or Newton-meters.
//! The solver breaks a joint when the impulse applied in one substep exceeds
//! its threshold, so real-world forces are divided by the substep rate.

/// Millimeters per meter.
pub const MM_PER_M: f64 = 1.0e3;

/// Square millimeters per square meter.
pub const MM2_PER_M2: f64 = 1.0e6;

#[inline]
pub fn length_to_mm(meters: f64) -> f64 {
    meters * MM_PER_M
}

#[inline]
pub fn area_to_mm2(square_meters: f64) -> f64 {
    square_meters * MM2_PER_M2
}

/// Converts a real-world threshold (N or N·m) into a per-substep impulse.
///
/// `correction` compensates the joint family's force/threshold discrepancy and
/// `slot_count` splits the load over the slots of one connection.
#[inline]
pub fn to_impulse(
    threshold: f64,
    correction: f64,
    slot_count: usize,
    steps_per_second: f64,
    time_scale: f64,
) -> f64 {
    threshold * correction / slot_count.max(1) as f64 / steps_per_second * time_scale
}
