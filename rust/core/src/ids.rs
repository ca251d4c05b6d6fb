// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed identifiers for elements, connections and constraint slots.
//!
//! Elements are numbered by the host, so [`ElementId`] is a plain index
//! newtype. Connections and constraint slots live in slot maps owned by the
//! pipeline and get generational keys that stay valid when siblings are
//! removed by the filter stages.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Key for a connection between two elements.
    pub struct ConnectionKey;

    /// Key for a single constraint slot (one physics joint).
    pub struct ConstraintKey;
}

/// Index of an element in the host-supplied element list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u32);

impl ElementId {
    /// Returns the id as a slice index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for ElementId {
    fn from(i: usize) -> Self {
        ElementId(i as u32)
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An unordered element pair, always stored with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementPair {
    a: ElementId,
    b: ElementId,
}

impl ElementPair {
    /// Builds a pair from two ids in either order. Returns `None` for a self pair.
    pub fn new(x: ElementId, y: ElementId) -> Option<Self> {
        match x.cmp(&y) {
            std::cmp::Ordering::Less => Some(Self { a: x, b: y }),
            std::cmp::Ordering::Greater => Some(Self { a: y, b: x }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// The smaller element id.
    #[inline]
    pub fn a(&self) -> ElementId {
        self.a
    }

    /// The larger element id.
    #[inline]
    pub fn b(&self) -> ElementId {
        self.b
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.a == id || self.b == id
    }

    /// Returns the endpoint opposite to `id`, if `id` is an endpoint.
    pub fn other(&self, id: ElementId) -> Option<ElementId> {
        if id == self.a {
            Some(self.b)
        } else if id == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}
