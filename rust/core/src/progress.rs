// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Progress reporting. Purely observational; callbacks never affect results.

/// Pipeline stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Search,
    Contact,
    Filter,
    Cluster,
    Synthesis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Search => "search",
            Stage::Contact => "contact",
            Stage::Filter => "filter",
            Stage::Cluster => "cluster",
            Stage::Synthesis => "synthesis",
        }
    }
}

/// One progress report: `done` units out of `total` (0 when unknown, as for
/// clustering passes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub done: usize,
    pub total: usize,
}

impl ProgressEvent {
    /// Completion in percent, if the total is known.
    pub fn percent(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.done as f64 * 100.0 / self.total as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent() {
        let e = ProgressEvent {
            stage: Stage::Search,
            done: 1,
            total: 4,
        };
        assert_eq!(e.percent(), Some(25.0));
        assert_eq!(
            ProgressEvent {
                stage: Stage::Cluster,
                done: 3,
                total: 0
            }
            .percent(),
            None
        );
        assert_eq!(Stage::Synthesis.as_str(), "synthesis");
    }
}
