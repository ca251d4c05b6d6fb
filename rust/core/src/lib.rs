// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Rigid-Bond Core
//!
//! Shared data model for synthesizing breakable joints between the rigid
//! elements of a discretized structure.
//!
//! ## Overview
//!
//! - **Elements**: world-space solids with bounds, centroid, group and mass
//! - **Element groups**: immutable configuration snapshots with compiled
//!   breaking-threshold formulas
//! - **Topology table**: the 26 connection types, each a fixed list of
//!   constraint slots with degree-of-freedom roles
//! - **Run configuration**: search, clustering and unit-conversion settings
//!
//! ## Quick Start
//!
//! ```rust
//! use rigid_bond_core::{Expr, Vars};
//!
//! // 5 N/mm² compressive strength over the contact area
//! let expr = Expr::compile("5 * a").unwrap();
//! let value = expr.eval(&Vars { a: 1.0e6, ..Vars::default() });
//! assert_eq!(value, 5.0e6);
//! ```

pub mod config;
pub mod contact;
pub mod element;
pub mod error;
pub mod expr;
pub mod group;
pub mod ids;
pub mod progress;
pub mod topology;
pub mod units;

pub use config::{RunConfig, SearchStrategyKind};
pub use contact::{Axis, ContactGeometry, AREA_EPSILON};
pub use element::{Aabb, Element};
pub use error::{Error, Result};
pub use expr::{Expr, Vars};
pub use group::{
    ElementGroup, GroupDef, GroupFlags, GroupIndex, GroupTable, ThresholdExprs, Tolerance,
    ToleranceSet, MAX_GROUP_COUNT,
};
pub use ids::{ConnectionKey, ConstraintKey, ElementId, ElementPair};
pub use progress::{ProgressEvent, Stage};
pub use topology::{ConnectionType, JointKind, Role, SlotTemplate, Topology, TOPOLOGY_TABLE};

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, UnitQuaternion, Vector3};
