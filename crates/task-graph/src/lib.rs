//! Dependency graph algorithms for trellis.
//!
//! This crate provides a directed graph keyed by string ids, built on
//! petgraph, with the algorithms the task dependency engine needs:
//!
//! - [`DependencyGraph::would_create_cycle`]: reachability check run before an
//!   edge is inserted, returning the cycle the edge would close
//! - [`DependencyGraph::detect_cycles`]: white/gray/black walk for diagnostics
//! - [`DependencyGraph::levels`]: longest-path layering from the sources
//! - [`DependencyGraph::reachable_within`] and
//!   [`DependencyGraph::longest_chain_from`]: depth-capped walks used for
//!   impact analysis
//!
//! # Example
//!
//! ```
//! use trellis_graph::DependencyGraph;
//!
//! let mut graph: DependencyGraph<()> = DependencyGraph::new();
//! graph.add_node("design", ());
//! graph.add_node("build", ());
//! graph.add_edge("design", "build", ()).unwrap();
//!
//! assert!(graph.would_create_cycle("build", "design").is_some());
//! assert_eq!(graph.levels()["build"], 1);
//! ```

mod error;
mod graph;
mod traversal;
mod validation;

pub use error::{Error, Result};
pub use graph::{DependencyGraph, GraphNode};
pub use traversal::{Layers, Reachability, Reached, TopologicalOrder};
pub use validation::ValidationResult;
