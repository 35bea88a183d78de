//! Error types for the trellis core.
//!
//! The variants follow the taxonomy the HTTP layer maps to status codes:
//! not found, validation (with a sub-tag), conflict, authorization and
//! internal failures.

use crate::model::TaskId;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Result type for trellis core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of record a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// A task.
    Task,
    /// A dependency edge.
    Dependency,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task => f.write_str("Task"),
            Self::Dependency => f.write_str("Dependency"),
        }
    }
}

/// Sub-tag of a [`Error::Validation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationKind {
    /// A task cannot depend on itself.
    SelfDependency,
    /// The dependency would close a cycle of blocking edges.
    Circular,
    /// A move would push the hierarchy past its maximum depth.
    MaxDepthExceeded,
    /// A move would make a task its own ancestor.
    CircularReference,
    /// The request itself is malformed.
    InvalidRequest,
}

impl ValidationKind {
    /// Stable tag string.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::SelfDependency => "self-dependency",
            Self::Circular => "circular",
            Self::MaxDepthExceeded => "max-depth-exceeded",
            Self::CircularReference => "circular-reference",
            Self::InvalidRequest => "invalid-request",
        }
    }
}

/// Coarse error kind used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Referenced record does not exist.
    NotFound,
    /// Request violates an invariant.
    Validation,
    /// Record already exists.
    Conflict,
    /// Caller lacks rights.
    Authorization,
    /// Unexpected failure.
    Internal,
}

/// Main error type for trellis core operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Referenced task or dependency does not exist.
    #[error("{entity} not found: {id}")]
    #[diagnostic(
        code(trellis::not_found),
        help("Check that the id refers to an existing record")
    )]
    NotFound {
        /// Kind of record that was looked up.
        entity: EntityKind,
        /// The id that was not found.
        id: String,
    },

    /// Request violates a graph or hierarchy invariant.
    #[error("{message}")]
    #[diagnostic(code(trellis::validation))]
    Validation {
        /// Sub-tag describing the violated rule.
        kind: ValidationKind,
        /// Human-readable description.
        message: String,
        /// Offending path, for cycle errors.
        path: Option<Vec<TaskId>>,
    },

    /// A dependency with the same endpoints and type already exists.
    #[error("{message}")]
    #[diagnostic(code(trellis::conflict))]
    Conflict {
        /// Human-readable description.
        message: String,
    },

    /// Raised by a collaborator when the caller lacks rights.
    #[error("Not authorized: {message}")]
    #[diagnostic(code(trellis::authorization))]
    Authorization {
        /// Human-readable description.
        message: String,
    },

    /// Unexpected store failure or corrupted data.
    #[error("Internal error: {message}")]
    #[diagnostic(code(trellis::internal))]
    Internal {
        /// Human-readable description.
        message: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(trellis::config::invalid),
        help("Check the trellis configuration file for invalid values")
    )]
    Configuration {
        /// Human-readable description.
        message: String,
    },

    /// I/O error with path context.
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(trellis::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available.
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write").
        operation: String,
    },
}

impl From<trellis_graph::Error> for Error {
    fn from(error: trellis_graph::Error) -> Self {
        Self::internal(format!("Dependency graph error: {error}"))
    }
}

impl Error {
    /// Create a task-not-found error.
    #[must_use]
    pub fn task_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: EntityKind::Task,
            id: id.to_string(),
        }
    }

    /// Create a dependency-not-found error.
    #[must_use]
    pub fn dependency_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: EntityKind::Dependency,
            id: id.to_string(),
        }
    }

    /// Create a validation error without a path.
    #[must_use]
    pub fn validation(kind: ValidationKind, message: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            message: message.into(),
            path: None,
        }
    }

    /// Create a circular-dependency error carrying the cycle.
    #[must_use]
    pub fn circular(path: Vec<TaskId>) -> Self {
        let chain = path
            .iter()
            .map(TaskId::as_str)
            .collect::<Vec<_>>()
            .join(" -> ");
        Self::Validation {
            kind: ValidationKind::Circular,
            message: format!("Creating this dependency would create a circular dependency: {chain}"),
            path: Some(path),
        }
    }

    /// Create a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create an authorization error.
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an I/O error with path context.
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Coarse kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::Internal { .. } | Self::Configuration { .. } | Self::Io { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Stable tag for this error, e.g. `circular` or `already-exists`.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not-found",
            Self::Validation { kind, .. } => kind.tag(),
            Self::Conflict { .. } => "already-exists",
            Self::Authorization { .. } => "unauthorized",
            Self::Internal { .. } => "internal",
            Self::Configuration { .. } => "configuration",
            Self::Io { .. } => "io",
        }
    }

    /// The validation sub-tag, if this is a validation error.
    #[must_use]
    pub const fn validation_kind(&self) -> Option<ValidationKind> {
        match self {
            Self::Validation { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
