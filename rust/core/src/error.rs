// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types shared by every pipeline stage.
//!
//! Per-item failures (one bad pair, one bad formula value) are recovered
//! where they happen and only logged. The variants below are the ones that
//! surface to callers: configuration rejected at load time, precondition
//! failures that abort a run before it starts, and cache decoding problems.

use crate::ids::ElementId;

/// Result type alias for connection-synthesis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A group definition is invalid (unknown connection type, duplicate name, ...).
    #[error("element group '{group}': {message}")]
    Configuration { group: String, message: String },

    /// A threshold formula failed to compile.
    #[error("invalid threshold formula '{formula}': {message}")]
    Expression { formula: String, message: String },

    /// Two elements produced zero or negative contact area, or a degenerate box.
    #[error("degenerate contact geometry between elements {0} and {1}")]
    GeometryDegenerate(ElementId, ElementId),

    /// A cached connection references an element that no longer exists.
    #[error("cached connection {connection} references missing element {element}")]
    MissingReference { connection: usize, element: ElementId },

    /// More element groups were defined than the configured maximum.
    #[error("{count} element groups defined, maximum is {max}")]
    LimitExceeded { count: usize, max: usize },

    /// The run was started without any elements.
    #[error("no elements supplied to the pipeline")]
    NoElements,

    /// Element ids must equal their position in the element list.
    #[error("element at position {position} has id {id}")]
    ElementOrder { position: usize, id: ElementId },

    /// The run was started without any element group.
    #[error("element group table is empty")]
    EmptyConfiguration,

    /// A run-configuration value is out of range.
    #[error("invalid run configuration: {0}")]
    InvalidRunConfig(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
