// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rigid-Bond Geometry
//!
//! Spatial queries and contact measurement for element pairs: a grid
//! spatial hash, candidate-pair search strategies, bounding-box and
//! face-based contact estimation, and volume-based area correction.

pub mod contact;
pub mod correction;
pub mod mesh;
pub mod search;
pub mod spatial;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};

pub use contact::{evaluate_contact, evaluate_pairs, Contact, ContactSettings};
pub use correction::{
    correct_contact_area_by_volume, effective_contact, volume_correction_factor, VolumeFactors,
};
pub use mesh::{element_volume, mesh_volume, polygon_area, polygon_normal};
pub use rigid_bond_core::{Error, Result};
pub use search::{
    strategy_for, BoundingBoxSearch, CandidatePair, CandidateSearchStrategy, SearchParams,
    VertexProximitySearch,
};
pub use spatial::{Neighbor, SpatialIndex};
