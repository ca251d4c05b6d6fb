// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Full and update pipelines.
//!
//! A full run searches candidate pairs, measures their contacts, filters and
//! clusters the connections, then resolves and synthesizes constraints.
//! Update mode skips everything up to clustering and re-runs resolution and
//! synthesis on a [`ConnectionCache`], so threshold or group changes apply
//! without searching again.

use std::time::Instant;

use rigid_bond_core::{
    Element, ElementPair, Error, GroupTable, ProgressEvent, Result, RunConfig, Stage,
};
use rigid_bond_geometry::{
    correct_contact_area_by_volume, element_volume, evaluate_pairs, strategy_for,
    ContactSettings, SearchParams,
};
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::cache::ConnectionCache;
use crate::cluster::{cluster_locations, ClusterReport};
use crate::connection::{Connection, ConnectionSet};
use crate::diagnostics::{ConnectionDiagnostics, Diagnostics};
use crate::filter::{filter_connections, FilterContext, FilterReport, ReparentPlan};
use crate::priority::{Endpoint, PriorityResolver};
use crate::synth::{check_integrity, synthesize, ConstraintSpec, SlotInput, SynthesisOutput};

/// Stage counts of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub elements: usize,
    /// Candidate pairs found by the search (0 in update mode).
    pub candidates: usize,
    pub filter: FilterReport,
    pub cluster: ClusterReport,
    /// Connections that produced constraints.
    pub resolved: usize,
    /// Connections dropped because neither group creates one.
    pub unresolved: usize,
    pub constraints: usize,
    pub integrity_warnings: usize,
    /// Cached connections skipped in update mode.
    pub missing_references: usize,
}

/// Everything a run produces.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub connections: ConnectionSet,
    pub synthesis: SynthesisOutput,
    pub diagnostics: Diagnostics,
    /// Empty in update mode.
    pub reparent: ReparentPlan,
    pub report: RunReport,
}

impl RunOutput {
    /// Snapshot for a later update run.
    pub fn cache(&self) -> ConnectionCache {
        ConnectionCache::from_set(&self.connections, self.report.elements)
    }

    /// Constraints grouped per connection, in connection order.
    pub fn constraints_by_connection(&self) -> Vec<(ElementPair, Vec<&ConstraintSpec>)> {
        self.connections
            .iter()
            .map(|(_, c)| {
                let specs = c
                    .slots
                    .iter()
                    .filter_map(|&k| self.synthesis.get(k))
                    .collect();
                (c.pair, specs)
            })
            .collect()
    }

    /// All constraints in connection order.
    pub fn constraint_specs(&self) -> Vec<&ConstraintSpec> {
        self.constraints_by_connection()
            .into_iter()
            .flat_map(|(_, specs)| specs)
            .collect()
    }
}

/// Connection synthesis over an immutable configuration snapshot.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: RunConfig,
    groups: GroupTable,
}

impl Pipeline {
    /// Validates the configuration. The group table is shared, not copied.
    pub fn new(config: RunConfig, groups: GroupTable) -> Result<Self> {
        config.validate()?;
        if groups.is_empty() {
            return Err(Error::EmptyConfiguration);
        }
        if groups.len() > config.max_element_groups {
            return Err(Error::LimitExceeded {
                count: groups.len(),
                max: config.max_element_groups,
            });
        }
        Ok(Self { config, groups })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn groups(&self) -> &GroupTable {
        &self.groups
    }

    /// Same groups, different run configuration.
    pub fn with_config(&self, config: RunConfig) -> Result<Self> {
        Self::new(config, self.groups.clone())
    }

    /// Full run. `predefined` pairs already joined by the host get no
    /// connection.
    pub fn run(&self, elements: &[Element], predefined: &FxHashSet<ElementPair>) -> Result<RunOutput> {
        self.run_with_progress(elements, predefined, |_| {})
    }

    pub fn run_with_progress(
        &self,
        elements: &[Element],
        predefined: &FxHashSet<ElementPair>,
        mut progress: impl FnMut(ProgressEvent),
    ) -> Result<RunOutput> {
        let start = Instant::now();
        check_elements(elements)?;
        tracing::info!(
            elements = elements.len(),
            groups = self.groups.len(),
            predefined = predefined.len(),
            "starting connection synthesis"
        );

        // Candidate search
        let strategy = strategy_for(self.config.search_strategy);
        let params = SearchParams {
            search_distance: self.config.search_distance,
            connection_count_limit: self.config.connection_count_limit,
        };
        let candidates = strategy.search(elements, &params, &mut progress);

        // Contact geometry
        let pairs: Vec<ElementPair> = candidates.iter().map(|c| c.pair).collect();
        let contacts = evaluate_pairs(elements, &pairs, &ContactSettings::from_config(&self.config));
        progress(ProgressEvent {
            stage: Stage::Contact,
            done: pairs.len(),
            total: pairs.len(),
        });
        let mut connections = ConnectionSet::new();
        for (candidate, contact) in candidates.iter().zip(contacts) {
            // Vertex search reports where the pair actually touches
            let location = candidate.location.unwrap_or(contact.location);
            connections.insert(Connection::new(candidate.pair, location, contact.geometry));
        }

        // Filter
        let masses = element_masses(elements, &self.groups);
        let ctx = FilterContext {
            elements,
            groups: &self.groups,
            config: &self.config,
            predefined,
            masses: &masses,
        };
        let (filter, reparent) = filter_connections(&mut connections, &ctx);
        progress(ProgressEvent {
            stage: Stage::Filter,
            done: filter.output,
            total: filter.input,
        });

        // Cluster
        let mut locations = connections.locations();
        let cluster = cluster_locations(&mut locations, self.config.cluster_radius, &mut progress);
        connections.set_locations(&locations);

        let mut output = self.resolve_and_synthesize(elements, connections, &mut progress);
        output.reparent = reparent;
        output.report.candidates = candidates.len();
        output.report.filter = filter;
        output.report.cluster = cluster;

        tracing::info!(
            candidates = output.report.candidates,
            connections = output.report.resolved,
            constraints = output.report.constraints,
            reparented = output.reparent.assignments.len(),
            integrity_warnings = output.report.integrity_warnings,
            elapsed_ms = start.elapsed().as_millis(),
            "connection synthesis complete"
        );
        Ok(output)
    }

    /// Update run on a cached connection set.
    pub fn update(&self, elements: &[Element], cache: &ConnectionCache) -> Result<RunOutput> {
        self.update_with_progress(elements, cache, |_| {})
    }

    pub fn update_with_progress(
        &self,
        elements: &[Element],
        cache: &ConnectionCache,
        mut progress: impl FnMut(ProgressEvent),
    ) -> Result<RunOutput> {
        let start = Instant::now();
        check_elements(elements)?;

        let restored = cache.restore(elements.len());
        let mut output =
            self.resolve_and_synthesize(elements, restored.connections, &mut progress);
        output.report.missing_references = restored.skipped.len();

        let mut mismatched = 0;
        for (key, connection) in output.connections.iter() {
            let Some(&recorded) = restored.recorded_slots.get(key) else {
                continue;
            };
            if recorded != connection.slots.len() {
                tracing::warn!(
                    pair = ?connection.pair,
                    recorded,
                    synthesized = connection.slots.len(),
                    "slot count differs from the cached connection"
                );
                mismatched += 1;
            }
        }
        output.report.integrity_warnings += mismatched;

        tracing::info!(
            cached = cache.len(),
            skipped = output.report.missing_references,
            connections = output.report.resolved,
            constraints = output.report.constraints,
            integrity_warnings = output.report.integrity_warnings,
            elapsed_ms = start.elapsed().as_millis(),
            "connection update complete"
        );
        Ok(output)
    }

    /// Resolves every connection and synthesizes its constraints. Connections
    /// that resolve to nothing are removed.
    fn resolve_and_synthesize(
        &self,
        elements: &[Element],
        mut connections: ConnectionSet,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> RunOutput {
        let factors = correct_contact_area_by_volume(elements);
        let resolver = PriorityResolver::new(&self.groups, &self.config);
        let endpoint = |e: &Element| Endpoint {
            group: self.groups.index_of(&e.group),
            active: e.active,
            volume_factor: factors.get(e.id.index()),
        };

        let total = connections.len();
        let mut synthesis = SynthesisOutput::default();
        let mut diagnostics = Diagnostics::default();
        let mut unresolved = Vec::new();

        for (done, (key, connection)) in connections.iter_mut().enumerate() {
            progress(ProgressEvent {
                stage: Stage::Synthesis,
                done: done + 1,
                total,
            });
            let (a, b) = (
                &elements[connection.pair.a().index()],
                &elements[connection.pair.b().index()],
            );
            let Some(resolution) = resolver.resolve(
                &endpoint(a),
                &endpoint(b),
                &connection.contact,
                &connection.location,
                connection.suppression_only,
            ) else {
                unresolved.push(key);
                continue;
            };

            let group = self.groups.get(resolution.governing);
            let specs = synthesize(
                &SlotInput {
                    pair: connection.pair,
                    location: connection.location,
                    centroid_a: a.centroid,
                    centroid_b: b.centroid,
                    resolution: &resolution,
                    group,
                },
                &self.config,
            );
            diagnostics.push(ConnectionDiagnostics::new(
                connection.pair,
                &resolution,
                &group.name,
                &specs,
            ));
            connection.slots = synthesis.insert_all(specs);
        }

        for key in &unresolved {
            connections.remove(*key);
        }
        if !unresolved.is_empty() {
            tracing::debug!(count = unresolved.len(), "connections without a governing type dropped");
        }

        synthesis.integrity_warnings = check_integrity(&connections, &synthesis);
        let report = RunReport {
            elements: elements.len(),
            resolved: connections.len(),
            unresolved: unresolved.len(),
            constraints: synthesis.len(),
            integrity_warnings: synthesis.integrity_warnings,
            ..RunReport::default()
        };
        RunOutput {
            connections,
            synthesis,
            diagnostics,
            reparent: ReparentPlan::default(),
            report,
        }
    }
}

/// Rejects empty input and ids that do not match their positions.
fn check_elements(elements: &[Element]) -> Result<()> {
    if elements.is_empty() {
        return Err(Error::NoElements);
    }
    if let Some((position, e)) = elements
        .iter()
        .enumerate()
        .find(|(i, e)| e.id.index() != *i)
    {
        return Err(Error::ElementOrder { position, id: e.id });
    }
    Ok(())
}

/// Host mass, else group density times volume (mesh volume, else box volume).
pub fn element_masses(elements: &[Element], groups: &GroupTable) -> Vec<f64> {
    elements
        .iter()
        .map(|e| {
            e.mass.unwrap_or_else(|| {
                let volume = element_volume(e).unwrap_or_else(|| e.bounds.volume());
                groups.resolve(&e.group).density * volume
            })
        })
        .collect()
}
