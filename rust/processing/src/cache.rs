// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON snapshot of a connection set.
//!
//! The cache keeps everything update mode needs to re-run priority
//! resolution and synthesis without searching again: the pair, the clustered
//! location, the raw contact geometry and the slot count of the last run.
//! Slot map keys are mapped to sequential ids so the snapshot is portable.

use nalgebra::Point3;
use rigid_bond_core::{ConnectionKey, ContactGeometry, ElementId, ElementPair, Error, Result};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::connection::{Connection, ConnectionSet};

/// Snapshot format version.
pub const CACHE_VERSION: u32 = 1;

/// Serializable connection set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionCache {
    pub version: u32,
    /// Element count of the run that produced the cache.
    pub element_count: usize,
    pub connections: Vec<ConnectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: usize,
    pub a: u32,
    pub b: u32,
    pub location: [f64; 3],
    pub contact: ContactGeometry,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suppression_only: bool,
    pub slot_count: usize,
}

/// Connections rebuilt from a cache.
#[derive(Debug, Default)]
pub struct RestoredConnections {
    pub connections: ConnectionSet,
    /// Slot count recorded for each restored connection.
    pub recorded_slots: SecondaryMap<ConnectionKey, usize>,
    /// Records that could not be restored.
    pub skipped: Vec<Error>,
}

impl ConnectionCache {
    /// Snapshots a connection set in iteration order.
    pub fn from_set(set: &ConnectionSet, element_count: usize) -> Self {
        let connections = set
            .iter()
            .enumerate()
            .map(|(id, (_, c))| ConnectionRecord {
                id,
                a: c.pair.a().0,
                b: c.pair.b().0,
                location: [c.location.x, c.location.y, c.location.z],
                contact: c.contact,
                suppression_only: c.suppression_only,
                slot_count: c.slots.len(),
            })
            .collect();
        Self {
            version: CACHE_VERSION,
            element_count,
            connections,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let cache: ConnectionCache =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        if cache.version != CACHE_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported cache version {} (expected {})",
                cache.version, CACHE_VERSION
            )));
        }
        Ok(cache)
    }

    /// Rebuilds the connection set against `element_count` elements.
    ///
    /// Records that reference a missing element or join an element to itself
    /// are skipped and logged.
    pub fn restore(&self, element_count: usize) -> RestoredConnections {
        if self.element_count != element_count {
            tracing::warn!(
                cached = self.element_count,
                current = element_count,
                "element count changed since the cache was written"
            );
        }

        let mut restored = RestoredConnections::default();
        for record in &self.connections {
            let (a, b) = (ElementId(record.a), ElementId(record.b));
            if let Some(&missing) = [a, b].iter().find(|id| id.index() >= element_count) {
                let err = Error::MissingReference {
                    connection: record.id,
                    element: missing,
                };
                tracing::warn!(error = %err, "cached connection skipped");
                restored.skipped.push(err);
                continue;
            }
            let Some(pair) = ElementPair::new(a, b) else {
                let err = Error::Serialization(format!(
                    "connection {} joins element {} to itself",
                    record.id, a
                ));
                tracing::warn!(error = %err, "cached connection skipped");
                restored.skipped.push(err);
                continue;
            };

            let [x, y, z] = record.location;
            let mut connection = Connection::new(pair, Point3::new(x, y, z), record.contact);
            connection.suppression_only = record.suppression_only;
            let key = restored.connections.insert(connection);
            restored.recorded_slots.insert(key, record.slot_count);
        }
        restored
    }
}
