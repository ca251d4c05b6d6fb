// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Element groups: named connection configurations.
//!
//! Group definitions ([`GroupDef`]) are plain serde structs holding threshold
//! formulas as text. [`GroupTable::new`] compiles every formula, validates
//! connection types and the group count, and produces an immutable snapshot
//! that every pipeline stage reads. Editing a group means building a new
//! table between runs.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::topology::ConnectionType;

/// Distance (m) and rotation (rad) limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub distance: f64,
    pub rotation: f64,
}

/// Plastic and breaking tolerances of a group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceSet {
    pub plastic: Tolerance,
    pub breaking: Tolerance,
}

impl Default for ToleranceSet {
    fn default() -> Self {
        Self {
            plastic: Tolerance {
                distance: 0.1,
                rotation: 0.2,
            },
            breaking: Tolerance {
                distance: 0.2,
                rotation: 0.4,
            },
        }
    }
}

/// Boolean switches of a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupFlags {
    /// Drop connections to other groups of equal priority.
    pub no_cross_group: bool,
    /// Drop cross-group connections that are horizontal from both sides.
    pub no_horizontal_cross_group: bool,
    /// Keep zero-area pairs as collision-suppression-only connections.
    pub permanent_collision_suppression: bool,
    /// Treat sections as circular: area scaled by π/4.
    pub cylindrical_section: bool,
    /// Scale contact area by the element's solid/box cross-section ratio.
    pub volume_area_correction: bool,
}

fn zero_formula() -> String {
    "0".to_string()
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_spring_length() -> f64 {
    0.1
}

fn default_density() -> f64 {
    2400.0
}

/// Serializable group definition with formulas as text.
///
/// Threshold formulas yield Newtons (compressive, tensile, shear, plastic)
/// or Newton-meters (bend) from the variables documented in [`crate::expr`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDef {
    /// Group name; the empty name is the default group.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub connection_type: i32,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "zero_formula")]
    pub compressive: String,
    #[serde(default = "zero_formula")]
    pub tensile: String,
    #[serde(default = "zero_formula")]
    pub shear: String,
    #[serde(default)]
    pub shear_90: Option<String>,
    #[serde(default = "zero_formula")]
    pub bend: String,
    #[serde(default)]
    pub bend_90: Option<String>,
    #[serde(default = "zero_formula")]
    pub plastic: String,
    /// Plastic spring length in m.
    #[serde(default = "default_spring_length")]
    pub spring_length: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub tolerances: ToleranceSet,
    #[serde(default)]
    pub flags: GroupFlags,
    /// Material density in kg/m³.
    #[serde(default = "default_density")]
    pub density: f64,
}

impl Default for GroupDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            connection_type: 0,
            priority: 0,
            compressive: zero_formula(),
            tensile: zero_formula(),
            shear: zero_formula(),
            shear_90: None,
            bend: zero_formula(),
            bend_90: None,
            plastic: zero_formula(),
            spring_length: default_spring_length(),
            multiplier: default_multiplier(),
            tolerances: ToleranceSet::default(),
            flags: GroupFlags::default(),
            density: default_density(),
        }
    }
}

impl GroupDef {
    /// A group of the given name and connection type with zero thresholds.
    pub fn new(name: impl Into<String>, connection_type: i32) -> Self {
        Self {
            name: name.into(),
            connection_type,
            ..Self::default()
        }
    }

    /// Fills the threshold formulas from material strengths in N/mm².
    ///
    /// Linear thresholds are strength × area; bending uses the elastic section
    /// modulus w·h²/6 (mm³), converted from N·mm to N·m.
    pub fn with_strengths(mut self, compressive: f64, tensile: f64, shear: f64) -> Self {
        self.compressive = format!("{} * a", compressive);
        self.tensile = format!("{} * a", tensile);
        self.shear = format!("{} * a", shear);
        self.bend = format!("{} * w * h^2 / 6 / 1000", tensile);
        self.bend_90 = Some(format!("{} * h * w^2 / 6 / 1000", tensile));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_flags(mut self, flags: GroupFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Compiled threshold formulas.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExprs {
    pub compressive: Expr,
    pub tensile: Expr,
    pub shear: Expr,
    pub shear_90: Option<Expr>,
    pub bend: Expr,
    pub bend_90: Option<Expr>,
    pub plastic: Expr,
}

/// A compiled, validated element group.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementGroup {
    pub name: String,
    pub connection_type: ConnectionType,
    pub priority: i32,
    pub thresholds: ThresholdExprs,
    pub spring_length: f64,
    pub multiplier: f64,
    pub tolerances: ToleranceSet,
    pub flags: GroupFlags,
    pub density: f64,
}

impl ElementGroup {
    /// Compiles a definition. Every formula is validated here.
    pub fn compile(def: &GroupDef) -> Result<Self> {
        let connection_type =
            ConnectionType::new(def.connection_type).ok_or_else(|| Error::Configuration {
                group: def.name.clone(),
                message: format!("unknown connection type {}", def.connection_type),
            })?;

        let field = |label: &str, src: &str| {
            Expr::compile(src).map_err(|e| Error::Configuration {
                group: def.name.clone(),
                message: format!("{} threshold: {}", label, e),
            })
        };
        let optional = |label: &str, src: &Option<String>| -> Result<Option<Expr>> {
            src.as_deref().map(|s| field(label, s)).transpose()
        };

        if !(def.multiplier.is_finite() && def.multiplier >= 0.0) {
            return Err(Error::Configuration {
                group: def.name.clone(),
                message: format!("multiplier must be a non-negative number, got {}", def.multiplier),
            });
        }

        Ok(Self {
            name: def.name.clone(),
            connection_type,
            priority: def.priority,
            thresholds: ThresholdExprs {
                compressive: field("compressive", &def.compressive)?,
                tensile: field("tensile", &def.tensile)?,
                shear: field("shear", &def.shear)?,
                shear_90: optional("shear 90°", &def.shear_90)?,
                bend: field("bend", &def.bend)?,
                bend_90: optional("bend 90°", &def.bend_90)?,
                plastic: field("plastic", &def.plastic)?,
            },
            spring_length: def.spring_length,
            multiplier: def.multiplier,
            tolerances: def.tolerances,
            flags: def.flags,
            density: def.density,
        })
    }

    /// Active groups synthesize constraints; passive ones (type 0) do not.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.connection_type.is_passive()
    }

    #[inline]
    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }
}

/// Index of a group inside a [`GroupTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupIndex(pub u16);

/// Largest group count a [`GroupIndex`] can address.
pub const MAX_GROUP_COUNT: usize = u16::MAX as usize + 1;

/// Immutable snapshot of all element groups.
#[derive(Debug, Clone)]
pub struct GroupTable {
    groups: Arc<Vec<ElementGroup>>,
    by_name: Arc<FxHashMap<String, GroupIndex>>,
    default_group: GroupIndex,
}

impl GroupTable {
    /// Compiles and validates group definitions.
    ///
    /// A default group (empty name) is added when none is defined. Fails when
    /// no group is given, names repeat, a formula does not compile, or the
    /// group count exceeds `max_groups` or [`MAX_GROUP_COUNT`].
    pub fn new(defs: &[GroupDef], max_groups: usize) -> Result<Self> {
        if defs.is_empty() {
            return Err(Error::EmptyConfiguration);
        }

        let mut groups = Vec::with_capacity(defs.len() + 1);
        if !defs.iter().any(|d| d.name.is_empty()) {
            tracing::debug!("No default element group defined, adding a passive one");
            groups.push(ElementGroup::compile(&GroupDef::default())?);
        }
        for def in defs {
            groups.push(ElementGroup::compile(def)?);
        }

        let max = max_groups.min(MAX_GROUP_COUNT);
        if groups.len() > max {
            return Err(Error::LimitExceeded {
                count: groups.len(),
                max,
            });
        }

        let mut by_name = FxHashMap::default();
        for (i, g) in groups.iter().enumerate() {
            let index = u16::try_from(i).map_err(|_| Error::LimitExceeded {
                count: groups.len(),
                max,
            })?;
            if by_name.insert(g.name.clone(), GroupIndex(index)).is_some() {
                return Err(Error::Configuration {
                    group: g.name.clone(),
                    message: "duplicate group name".to_string(),
                });
            }
        }
        let default_group = by_name[""];

        Ok(Self {
            groups: Arc::new(groups),
            by_name: Arc::new(by_name),
            default_group,
        })
    }

    /// Decodes a JSON array of [`GroupDef`] and compiles it.
    pub fn from_json(json: &str, max_groups: usize) -> Result<Self> {
        let defs: Vec<GroupDef> = serde_json::from_str(json)?;
        Self::new(&defs, max_groups)
    }

    /// Resolves a group name; unknown names fall back to the default group.
    pub fn index_of(&self, name: &str) -> GroupIndex {
        self.by_name.get(name).copied().unwrap_or(self.default_group)
    }

    pub fn get(&self, index: GroupIndex) -> &ElementGroup {
        &self.groups[index.0 as usize]
    }

    /// The group governing an element with the given group name.
    pub fn resolve(&self, name: &str) -> &ElementGroup {
        self.get(self.index_of(name))
    }

    pub fn default_group(&self) -> &ElementGroup {
        self.get(self.default_group)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementGroup> {
        self.groups.iter()
    }
}
