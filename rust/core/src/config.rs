// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Global run configuration.
//!
//! A `RunConfig` is an immutable value handed to each pipeline invocation.
//! Hosts usually build it from their own settings storage; JSON loading is
//! provided for tooling and tests.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::group::MAX_GROUP_COUNT;

/// Candidate-search algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategyKind {
    /// Expanded bounding-box overlap (canonical).
    #[default]
    BoundingBox,
    /// Vertex pairs within search distance (legacy).
    VertexProximity,
}

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Gap (m) bridged between elements when searching for contacts.
    pub search_distance: f64,
    /// Face-to-box distance (m) used by the accurate contact-area mode.
    pub mesh_search_distance: f64,
    /// Connection points closer than this (m) are merged. 0 disables.
    pub cluster_radius: f64,
    /// Maximum connections per element. 0 means unlimited.
    pub connection_count_limit: usize,
    /// Elements whose largest dimension (m) is below this become children
    /// of a neighbor. 0 disables.
    pub minimum_element_size: f64,
    /// 0..1 factor reducing the horizontal part of constraint orientation.
    pub align_vertical: f64,
    /// Restrict contact boxes to nearby faces and measure face areas.
    pub accurate_area: bool,
    /// Elements are open surfaces; area is perimeter × thickness.
    pub non_manifold: bool,
    /// Treat every element as a surface regardless of its mesh.
    pub forced_surface: bool,
    /// Thickness (m) assumed for surface elements.
    pub surface_thickness: f64,
    pub steps_per_second: f64,
    pub time_scale: f64,
    /// Passive-to-active connections use the active group's thresholds.
    /// When off they are indestructible.
    pub passive_breaking: bool,
    /// Same-priority groups combine thresholds with min instead of max.
    pub prefer_lower_threshold: bool,
    /// Keep collision suppression for every zero-area pair.
    pub permanent_collision_suppression: bool,
    /// Orient constraints along the measured contact normal axis.
    pub snap_to_area_orientation: bool,
    /// Halve spring stiffness for hosts whose spring solver doubles it.
    pub halve_spring_stiffness: bool,
    /// Create plastic springs disabled until the host activates them.
    pub plastic_springs_start_disabled: bool,
    pub max_element_groups: usize,
    pub search_strategy: SearchStrategyKind,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            search_distance: 0.02,
            mesh_search_distance: 0.02,
            cluster_radius: 0.0,
            connection_count_limit: 0,
            minimum_element_size: 0.0,
            align_vertical: 0.0,
            accurate_area: false,
            non_manifold: false,
            forced_surface: false,
            surface_thickness: 0.1,
            steps_per_second: 100.0,
            time_scale: 1.0,
            passive_breaking: false,
            prefer_lower_threshold: true,
            permanent_collision_suppression: false,
            snap_to_area_orientation: false,
            halve_spring_stiffness: false,
            plastic_springs_start_disabled: false,
            max_element_groups: 100,
            search_strategy: SearchStrategyKind::BoundingBox,
        }
    }
}

impl RunConfig {
    /// Decodes a JSON object; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("search_distance", self.search_distance),
            ("mesh_search_distance", self.mesh_search_distance),
            ("cluster_radius", self.cluster_radius),
            ("minimum_element_size", self.minimum_element_size),
            ("surface_thickness", self.surface_thickness),
        ];
        for (name, v) in non_negative {
            if !(v.is_finite() && v >= 0.0) {
                return Err(Error::InvalidRunConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, v
                )));
            }
        }
        if !(self.steps_per_second.is_finite() && self.steps_per_second > 0.0) {
            return Err(Error::InvalidRunConfig(format!(
                "steps_per_second must be positive, got {}",
                self.steps_per_second
            )));
        }
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(Error::InvalidRunConfig(format!(
                "time_scale must be positive, got {}",
                self.time_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.align_vertical) {
            return Err(Error::InvalidRunConfig(format!(
                "align_vertical must be within 0..1, got {}",
                self.align_vertical
            )));
        }
        if self.max_element_groups > MAX_GROUP_COUNT {
            return Err(Error::InvalidRunConfig(format!(
                "max_element_groups must be at most {}, got {}",
                MAX_GROUP_COUNT, self.max_element_groups
            )));
        }
        Ok(())
    }

    /// Search distance that applies to contact evaluation.
    pub fn contact_search_distance(&self) -> f64 {
        if self.accurate_area {
            self.mesh_search_distance
        } else {
            self.search_distance
        }
    }

    #[inline]
    pub fn surface_mode(&self) -> bool {
        self.non_manifold || self.forced_surface
    }
}
