// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Rigid-Bond Processing
//!
//! Turns touching elements into breakable joints.
//!
//! ## Stages
//!
//! 1. candidate search and contact measurement (`rigid-bond-geometry`)
//! 2. [`filter`]: zero-area removal, reparenting, predefined pairs, group rules
//! 3. [`cluster`]: pairwise merging of nearby connection locations
//! 4. [`priority`]: governing group, connection type and thresholds
//! 5. [`synth`]: one constraint per slot of the connection type
//!
//! [`Pipeline::update`] re-runs stages 4 and 5 on a [`ConnectionCache`].
//!
//! ## Quick Start
//!
//! ```rust
//! use rigid_bond_core::{Element, ElementId, GroupDef, GroupTable, Point3, RunConfig};
//! use rigid_bond_processing::Pipeline;
//! use rustc_hash::FxHashSet;
//!
//! let groups = GroupTable::new(&[GroupDef::new("", 1).with_strengths(5.0, 0.5, 1.0)], 100).unwrap();
//! let pipeline = Pipeline::new(RunConfig::default(), groups).unwrap();
//! let elements = vec![
//!     Element::cuboid(ElementId(0), "a", "", Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)),
//!     Element::cuboid(ElementId(1), "b", "", Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 1.0, 2.0)),
//! ];
//! let output = pipeline.run(&elements, &FxHashSet::default()).unwrap();
//! assert_eq!(output.synthesis.len(), 1);
//! ```

pub mod cache;
pub mod cluster;
pub mod connection;
pub mod diagnostics;
pub mod filter;
pub mod pipeline;
pub mod priority;
pub mod synth;

pub use cache::{ConnectionCache, ConnectionRecord, RestoredConnections, CACHE_VERSION};
pub use cluster::{cluster_locations, ClusterReport};
pub use connection::{Connection, ConnectionSet, SlotKeys};
pub use diagnostics::{ConnectionDiagnostics, Diagnostics, DiagnosticsSummary};
pub use filter::{filter_connections, FilterContext, FilterReport, ReparentAssignment, ReparentPlan};
pub use pipeline::{element_masses, Pipeline, RunOutput, RunReport};
pub use priority::{Endpoint, PriorityResolver, Resolution, Thresholds};
pub use rigid_bond_core::{Error, Result};
pub use synth::{
    check_integrity, synthesize, AxisLimit, ConstraintSpec, SlotInput, SpringParams,
    SynthesisOutput, SPRING_DAMPING,
};
