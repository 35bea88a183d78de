//! Error types for dependency graph operations.

use thiserror::Error;

/// Result type for dependency graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during dependency graph operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A dependency cycle was detected in the graph.
    #[error("Cycle detected in dependency graph: {}", path.join(" -> "))]
    CycleDetected {
        /// Node ids along the cycle, first and last entries are the same node.
        path: Vec<String>,
    },

    /// An edge endpoint was not added to the graph before the edge.
    #[error("Edge '{from}' -> '{to}' references unknown node '{missing}'")]
    MissingNode {
        /// Source of the rejected edge.
        from: String,
        /// Target of the rejected edge.
        to: String,
        /// The endpoint that is not in the graph.
        missing: String,
    },
}
