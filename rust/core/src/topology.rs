// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection-type table.
//!
//! Every connection type (topology id 1..=26) is a fixed list of constraint
//! slots. Each slot has a joint kind and the set of load roles it carries;
//! the synthesizer derives degree-of-freedom locks, geometry correction and
//! the breaking threshold from those roles, so no per-type code exists.
//!
//! Two special ids are produced by priority resolution only: `-1` is an
//! indestructible fixed joint (element anchored to a passive foundation) and
//! `-2` keeps two elements from colliding without transmitting force.

use serde::{Deserialize, Serialize};

/// Load role carried by a constraint slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Compressive,
    Tensile,
    Shear,
    /// Shear along the width axis (90° rotated).
    Shear90,
    Bend,
    /// Bending about the width axis (90° rotated).
    Bend90,
    Torsion,
    /// Spring-based plastic deformation.
    Plastic,
}

impl Role {
    /// Whether the role restrains a linear degree of freedom.
    pub fn is_linear(self) -> bool {
        matches!(
            self,
            Role::Compressive | Role::Tensile | Role::Shear | Role::Shear90
        )
    }

    pub fn is_angular(self) -> bool {
        matches!(self, Role::Bend | Role::Bend90 | Role::Torsion)
    }
}

/// Physics joint flavor of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointKind {
    Fixed,
    Point,
    Generic,
    GenericSpring,
    Hinge,
}

impl JointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JointKind::Fixed => "FIXED",
            JointKind::Point => "POINT",
            JointKind::Generic => "GENERIC",
            JointKind::GenericSpring => "GENERIC_SPRING",
            JointKind::Hinge => "HINGE",
        }
    }
}

impl std::fmt::Display for JointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One constraint slot of a connection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTemplate {
    pub kind: JointKind,
    pub roles: &'static [Role],
}

impl SlotTemplate {
    const fn new(kind: JointKind, roles: &'static [Role]) -> Self {
        Self { kind, roles }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Force/threshold correction for the joint family.
    ///
    /// Generic joints under linear DOF locks transmit less than their nominal
    /// threshold, angular-only generic joints somewhat less, springs less still.
    pub fn geometry_correction(&self) -> f64 {
        match self.kind {
            JointKind::Fixed | JointKind::Point | JointKind::Hinge => 1.0,
            JointKind::Generic => {
                if self.roles.iter().any(|r| r.is_linear()) {
                    2.2
                } else {
                    1.5
                }
            }
            JointKind::GenericSpring => 2.0,
        }
    }
}

/// A connection type: an ordered list of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    pub id: i32,
    pub name: &'static str,
    pub slots: &'static [SlotTemplate],
}

impl Topology {
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.slots.iter().any(|s| s.has_role(role))
    }

    /// Position in [`TOPOLOGY_TABLE`]; special ids sort after every table entry.
    pub fn table_rank(&self) -> usize {
        if self.id >= 1 {
            (self.id - 1) as usize
        } else {
            TOPOLOGY_TABLE.len() + (-self.id) as usize
        }
    }

    pub fn is_special(&self) -> bool {
        self.id < 0
    }
}

use JointKind::{Fixed, Generic, GenericSpring as Spring, Hinge, Point};
use Role::*;

const fn slot(kind: JointKind, roles: &'static [Role]) -> SlotTemplate {
    SlotTemplate::new(kind, roles)
}

/// Connection types 1..=26, in tie-break order.
pub static TOPOLOGY_TABLE: [Topology; 26] = [
    Topology {
        id: 1,
        name: "1x FIXED",
        slots: &[slot(Fixed, &[Compressive, Tensile, Shear, Bend])],
    },
    Topology {
        id: 2,
        name: "1x POINT",
        slots: &[slot(Point, &[Compressive, Tensile, Shear])],
    },
    Topology {
        id: 3,
        name: "1x POINT + 1x FIXED",
        slots: &[
            slot(Point, &[Compressive, Tensile, Shear]),
            slot(Fixed, &[Bend]),
        ],
    },
    Topology {
        id: 4,
        name: "1x HINGE",
        slots: &[slot(Hinge, &[Compressive, Tensile, Shear, Bend])],
    },
    Topology {
        id: 5,
        name: "1x GENERIC",
        slots: &[slot(Generic, &[Compressive, Tensile, Shear, Bend])],
    },
    Topology {
        id: 6,
        name: "2x GENERIC",
        slots: &[
            slot(Generic, &[Compressive, Tensile, Shear]),
            slot(Generic, &[Bend]),
        ],
    },
    Topology {
        id: 7,
        name: "3x GENERIC",
        slots: &[
            slot(Generic, &[Compressive, Tensile]),
            slot(Generic, &[Shear]),
            slot(Generic, &[Bend]),
        ],
    },
    Topology {
        id: 8,
        name: "4x GENERIC",
        slots: &[
            slot(Generic, &[Compressive]),
            slot(Generic, &[Tensile]),
            slot(Generic, &[Shear]),
            slot(Generic, &[Bend]),
        ],
    },
    Topology {
        id: 9,
        name: "5x GENERIC",
        slots: &[
            slot(Generic, &[Compressive]),
            slot(Generic, &[Tensile]),
            slot(Generic, &[Shear]),
            slot(Generic, &[Bend]),
            slot(Generic, &[Torsion]),
        ],
    },
    Topology {
        id: 10,
        name: "6x GENERIC",
        slots: &[
            slot(Generic, &[Compressive]),
            slot(Generic, &[Tensile]),
            slot(Generic, &[Shear]),
            slot(Generic, &[Shear90]),
            slot(Generic, &[Bend]),
            slot(Generic, &[Bend90]),
        ],
    },
    Topology {
        id: 11,
        name: "7x GENERIC",
        slots: &[
            slot(Generic, &[Compressive]),
            slot(Generic, &[Tensile]),
            slot(Generic, &[Shear]),
            slot(Generic, &[Shear90]),
            slot(Generic, &[Bend]),
            slot(Generic, &[Bend90]),
            slot(Generic, &[Torsion]),
        ],
    },
    Topology {
        id: 12,
        name: "3x SPRING",
        slots: &[
            slot(Spring, &[Compressive, Tensile, Plastic]),
            slot(Spring, &[Shear, Plastic]),
            slot(Spring, &[Bend, Plastic]),
        ],
    },
    Topology {
        id: 13,
        name: "4x SPRING",
        slots: &[
            slot(Spring, &[Compressive, Plastic]),
            slot(Spring, &[Tensile, Plastic]),
            slot(Spring, &[Shear, Plastic]),
            slot(Spring, &[Bend, Plastic]),
        ],
    },
    Topology {
        id: 14,
        name: "6x SPRING",
        slots: &[
            slot(Spring, &[Compressive, Plastic]),
            slot(Spring, &[Tensile, Plastic]),
            slot(Spring, &[Shear, Plastic]),
            slot(Spring, &[Shear90, Plastic]),
            slot(Spring, &[Bend, Plastic]),
            slot(Spring, &[Bend90, Plastic]),
        ],
    },
    Topology {
        id: 15,
        name: "7x SPRING",
        slots: &[
            slot(Spring, &[Compressive, Plastic]),
            slot(Spring, &[Tensile, Plastic]),
            slot(Spring, &[Shear, Plastic]),
            slot(Spring, &[Shear90, Plastic]),
            slot(Spring, &[Bend, Plastic]),
            slot(Spring, &[Bend90, Plastic]),
            slot(Spring, &[Torsion, Plastic]),
        ],
    },
    Topology {
        id: 16,
        name: "1x FIXED + 1x SPRING",
        slots: &[
            slot(Fixed, &[Compressive, Tensile, Shear, Bend]),
            slot(Spring, &[Plastic]),
        ],
    },
    Topology {
        id: 17,
        name: "1x POINT + 1x SPRING",
        slots: &[
            slot(Point, &[Compressive, Tensile, Shear]),
            slot(Spring, &[Plastic]),
        ],
    },
    Topology {
        id: 18,
        name: "2x GENERIC + 2x SPRING",
        slots: &[
            slot(Generic, &[Compressive, Tensile, Shear]),
            slot(Generic, &[Bend]),
            slot(Spring, &[Compressive, Tensile, Shear, Plastic]),
            slot(Spring, &[Bend, Plastic]),
        ],
    },
    Topology {
        id: 19,
        name: "3x GENERIC + 3x SPRING",
        slots: &[
            slot(Generic, &[Compressive, Tensile]),
            slot(Generic, &[Shear]),
            slot(Generic, &[Bend]),
            slot(Spring, &[Compressive, Tensile, Plastic]),
            slot(Spring, &[Shear, Plastic]),
            slot(Spring, &[Bend, Plastic]),
        ],
    },
    Topology {
        id: 20,
        name: "4x GENERIC + 4x SPRING",
        slots: &[
            slot(Generic, &[Compressive]),
            slot(Generic, &[Tensile]),
            slot(Generic, &[Shear]),
            slot(Generic, &[Bend]),
            slot(Spring, &[Compressive, Plastic]),
            slot(Spring, &[Tensile, Plastic]),
            slot(Spring, &[Shear, Plastic]),
            slot(Spring, &[Bend, Plastic]),
        ],
    },
    Topology {
        id: 21,
        name: "1x POINT + 1x HINGE",
        slots: &[
            slot(Point, &[Compressive, Tensile, Shear]),
            slot(Hinge, &[Bend]),
        ],
    },
    Topology {
        id: 22,
        name: "1x GENERIC (compression only)",
        slots: &[slot(Generic, &[Compressive])],
    },
    Topology {
        id: 23,
        name: "1x GENERIC (tension only)",
        slots: &[slot(Generic, &[Tensile])],
    },
    Topology {
        id: 24,
        name: "2x GENERIC (no tension, no bending)",
        slots: &[slot(Generic, &[Compressive]), slot(Generic, &[Shear])],
    },
    Topology {
        id: 25,
        name: "3x GENERIC (no tension)",
        slots: &[
            slot(Generic, &[Compressive]),
            slot(Generic, &[Shear]),
            slot(Generic, &[Bend]),
        ],
    },
    Topology {
        id: 26,
        name: "1x SPRING",
        slots: &[slot(Spring, &[Plastic])],
    },
];

/// Indestructible fixed joint used to anchor active elements to passive ones.
pub static INDESTRUCTIBLE: Topology = Topology {
    id: -1,
    name: "1x FIXED (indestructible)",
    slots: &[slot(Fixed, &[])],
};

/// Collision suppression without load transfer.
pub static SUPPRESSION_ONLY: Topology = Topology {
    id: -2,
    name: "1x GENERIC (collision suppression)",
    slots: &[slot(Generic, &[])],
};

/// Looks up a topology by id (1..=26, -1, -2).
pub fn lookup(id: i32) -> Option<&'static Topology> {
    match id {
        -1 => Some(&INDESTRUCTIBLE),
        -2 => Some(&SUPPRESSION_ONLY),
        1..=26 => TOPOLOGY_TABLE.get((id - 1) as usize),
        _ => None,
    }
}

/// Connection type configured on an element group: 0 is passive, 1..=26
/// select a [`Topology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct ConnectionType(i32);

impl ConnectionType {
    pub const PASSIVE: ConnectionType = ConnectionType(0);

    /// Validates a group-level connection type.
    pub fn new(id: i32) -> Option<Self> {
        if id == 0 || (1..=26).contains(&id) {
            Some(ConnectionType(id))
        } else {
            None
        }
    }

    #[inline]
    pub fn id(self) -> i32 {
        self.0
    }

    #[inline]
    pub fn is_passive(self) -> bool {
        self.0 == 0
    }

    pub fn topology(self) -> Option<&'static Topology> {
        if self.is_passive() {
            None
        } else {
            lookup(self.0)
        }
    }
}

impl TryFrom<i32> for ConnectionType {
    type Error = String;

    fn try_from(id: i32) -> std::result::Result<Self, Self::Error> {
        ConnectionType::new(id).ok_or_else(|| format!("unknown connection type {}", id))
    }
}

impl From<ConnectionType> for i32 {
    fn from(t: ConnectionType) -> i32 {
        t.0
    }
}
