// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-connection diagnostics for inspection in the host.

use std::collections::BTreeMap;

use rigid_bond_core::{ElementPair, Error, Result};
use serde::Serialize;

use crate::priority::{Resolution, Thresholds};
use crate::synth::ConstraintSpec;

/// What was resolved for one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionDiagnostics {
    pub a: u32,
    pub b: u32,
    pub topology_id: i32,
    pub topology: &'static str,
    pub governing_group: String,
    /// Contact area after corrections (m²).
    pub area: f64,
    /// Real-world thresholds (N, N·m).
    pub thresholds: Thresholds,
    /// Breaking impulse per slot; `None` never breaks.
    pub slot_impulses: Vec<Option<f64>>,
}

impl ConnectionDiagnostics {
    pub fn new(
        pair: ElementPair,
        resolution: &Resolution,
        governing_group: &str,
        specs: &[ConstraintSpec],
    ) -> Self {
        Self {
            a: pair.a().0,
            b: pair.b().0,
            topology_id: resolution.topology.id,
            topology: resolution.topology.name,
            governing_group: governing_group.to_string(),
            area: resolution.contact.area,
            thresholds: resolution.thresholds,
            slot_impulses: specs.iter().map(|s| s.breaking_threshold).collect(),
        }
    }
}

/// Diagnostics of a whole run, in connection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub connections: Vec<ConnectionDiagnostics>,
}

/// Aggregate view of [`Diagnostics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticsSummary {
    pub connections: usize,
    pub by_topology: BTreeMap<i32, usize>,
    pub total_area: f64,
    /// Connections whose slots never break.
    pub unbreakable: usize,
}

impl Diagnostics {
    pub fn push(&mut self, entry: ConnectionDiagnostics) {
        self.connections.push(entry);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn find(&self, pair: ElementPair) -> Option<&ConnectionDiagnostics> {
        self.connections
            .iter()
            .find(|d| d.a == pair.a().0 && d.b == pair.b().0)
    }

    pub fn summary(&self) -> DiagnosticsSummary {
        let mut summary = DiagnosticsSummary {
            connections: self.connections.len(),
            ..DiagnosticsSummary::default()
        };
        for d in &self.connections {
            *summary.by_topology.entry(d.topology_id).or_default() += 1;
            summary.total_area += d.area;
            if d.slot_impulses.iter().all(Option::is_none) {
                summary.unbreakable += 1;
            }
        }
        summary
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
