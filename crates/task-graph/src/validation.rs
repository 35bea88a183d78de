//! Validation utilities for dependency graphs.
//!
//! Cycle detection uses a white/gray/black depth-first walk so that it is
//! bounded by the number of nodes and reports every back edge it finds.

use crate::{DependencyGraph, Error};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;

/// Result of graph validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the graph is valid (no cycles).
    pub is_valid: bool,
    /// List of validation errors, if any.
    pub errors: Vec<Error>,
    /// Cycles found, each as node ids with the first id repeated at the end.
    pub cycles: Vec<Vec<String>>,
}

impl ValidationResult {
    /// Create a valid result.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
            cycles: vec![],
        }
    }

    /// Create an invalid result from the cycles that were found.
    #[must_use]
    pub fn invalid(cycles: Vec<Vec<String>>) -> Self {
        let errors = cycles
            .iter()
            .map(|path| Error::CycleDetected { path: path.clone() })
            .collect();
        Self {
            is_valid: false,
            errors,
            cycles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

struct Frame {
    node: NodeIndex,
    successors: Vec<NodeIndex>,
    cursor: usize,
}

impl<N, E> DependencyGraph<N, E> {
    /// Find cycles in the graph.
    ///
    /// One cycle is reported per back edge met during the walk, so the result
    /// is not an exhaustive enumeration of elementary cycles. Returns an empty
    /// list for a DAG.
    #[must_use]
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut marks: HashMap<NodeIndex, Mark> = HashMap::new();
        let mut cycles = Vec::new();

        for root in self.graph.node_indices() {
            if marks.get(&root).copied().unwrap_or(Mark::White) != Mark::White {
                continue;
            }

            marks.insert(root, Mark::Gray);
            let mut stack = vec![self.frame(root)];

            loop {
                let Some(frame) = stack.last_mut() else {
                    break;
                };

                if frame.cursor < frame.successors.len() {
                    let next = frame.successors[frame.cursor];
                    frame.cursor += 1;

                    match marks.get(&next).copied().unwrap_or(Mark::White) {
                        Mark::White => {
                            marks.insert(next, Mark::Gray);
                            stack.push(self.frame(next));
                        }
                        Mark::Gray => {
                            if let Some(pos) = stack.iter().position(|f| f.node == next) {
                                let mut cycle: Vec<String> = stack[pos..]
                                    .iter()
                                    .map(|f| self.graph[f.node].id.clone())
                                    .collect();
                                cycle.push(self.graph[next].id.clone());
                                cycles.push(cycle);
                            }
                        }
                        Mark::Black => {}
                    }
                } else {
                    let node = frame.node;
                    stack.pop();
                    marks.insert(node, Mark::Black);
                }
            }
        }

        cycles
    }

    fn frame(&self, node: NodeIndex) -> Frame {
        Frame {
            node,
            successors: self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .collect(),
            cursor: 0,
        }
    }

    /// Validate the graph structure.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let cycles = self.detect_cycles();
        if cycles.is_empty() {
            ValidationResult::valid()
        } else {
            ValidationResult::invalid(cycles)
        }
    }
}
