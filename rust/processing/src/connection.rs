// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection storage.
//!
//! Connections live in a slot map so that filter stages can drop entries
//! without invalidating the keys of the survivors. Iteration follows
//! insertion order as long as nothing is re-inserted, which the pipeline
//! relies on for deterministic output.

use nalgebra::Point3;
use rigid_bond_core::{ConnectionKey, ConstraintKey, ContactGeometry, ElementPair};
use slotmap::SlotMap;
use smallvec::SmallVec;

/// Constraint keys of one connection. Most types have at most eight slots.
pub type SlotKeys = SmallVec<[ConstraintKey; 8]>;

/// A synthesized link between two elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub pair: ElementPair,
    /// Joint location; moved by clustering.
    pub location: Point3<f64>,
    pub contact: ContactGeometry,
    /// Kept only to suppress collisions; carries no load.
    pub suppression_only: bool,
    /// Constraint slots, filled by synthesis.
    pub slots: SlotKeys,
}

impl Connection {
    pub fn new(pair: ElementPair, location: Point3<f64>, contact: ContactGeometry) -> Self {
        Self {
            pair,
            location,
            contact,
            suppression_only: false,
            slots: SlotKeys::new(),
        }
    }
}

/// Ordered collection of connections with stable keys.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSet {
    connections: SlotMap<ConnectionKey, Connection>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connection: Connection) -> ConnectionKey {
        self.connections.insert(connection)
    }

    pub fn get(&self, key: ConnectionKey) -> Option<&Connection> {
        self.connections.get(key)
    }

    pub fn get_mut(&mut self, key: ConnectionKey) -> Option<&mut Connection> {
        self.connections.get_mut(key)
    }

    pub fn remove(&mut self, key: ConnectionKey) -> Option<Connection> {
        self.connections.remove(key)
    }

    /// Keeps the connections for which `keep` returns true; returns how many
    /// were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(ConnectionKey, &mut Connection) -> bool) -> usize {
        let before = self.connections.len();
        self.connections.retain(|k, c| keep(k, c));
        before - self.connections.len()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConnectionKey, &Connection)> {
        self.connections.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ConnectionKey, &mut Connection)> {
        self.connections.iter_mut()
    }

    pub fn keys(&self) -> Vec<ConnectionKey> {
        self.connections.keys().collect()
    }

    /// Connection locations in iteration order.
    pub fn locations(&self) -> Vec<Point3<f64>> {
        self.connections.values().map(|c| c.location).collect()
    }

    /// Overwrites locations in iteration order.
    pub fn set_locations(&mut self, locations: &[Point3<f64>]) {
        for (c, p) in self.connections.values_mut().zip(locations) {
            c.location = *p;
        }
    }

    /// Total number of constraint slots over all connections.
    pub fn slot_count(&self) -> usize {
        self.connections.values().map(|c| c.slots.len()).sum()
    }
}
