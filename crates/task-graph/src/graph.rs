//! Dependency graph built on petgraph.
//!
//! Nodes are keyed by opaque string ids. An edge `a -> b` means "`a` must
//! resolve before `b`", so following outgoing edges walks from a blocker to
//! everything waiting on it.

use crate::{Error, Layers, Result, TopologicalOrder};
use petgraph::Direction;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// A node in the dependency graph.
#[derive(Debug, Clone)]
pub struct GraphNode<N> {
    /// Opaque node id.
    pub id: String,
    /// Payload carried by the node.
    pub data: N,
}

/// Directed dependency graph keyed by string ids.
///
/// `N` is the node payload and `E` the edge weight. The graph itself does not
/// forbid cycles; callers use [`DependencyGraph::would_create_cycle`] before
/// inserting an edge, and [`DependencyGraph::detect_cycles`] to inspect data
/// that was loaded from elsewhere.
pub struct DependencyGraph<N, E = ()> {
    pub(crate) graph: DiGraph<GraphNode<N>, E>,
    pub(crate) id_to_node: HashMap<String, NodeIndex>,
}

impl<N, E> DependencyGraph<N, E> {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            id_to_node: HashMap::new(),
        }
    }

    /// Add a node to the graph.
    ///
    /// If a node with the same id already exists, its index is returned and
    /// the new payload is dropped.
    pub fn add_node(&mut self, id: &str, data: N) -> NodeIndex {
        if let Some(&node) = self.id_to_node.get(id) {
            return node;
        }

        let node_index = self.graph.add_node(GraphNode {
            id: id.to_string(),
            data,
        });
        self.id_to_node.insert(id.to_string(), node_index);
        debug!(node = %id, "Added graph node");

        node_index
    }

    /// Add an edge `from -> to`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingNode`] if either endpoint has not been added.
    pub fn add_edge(&mut self, from: &str, to: &str, weight: E) -> Result<EdgeIndex> {
        let missing = |id: &str| Error::MissingNode {
            from: from.to_string(),
            to: to.to_string(),
            missing: id.to_string(),
        };
        let from_index = self.node_index(from).ok_or_else(|| missing(from))?;
        let to_index = self.node_index(to).ok_or_else(|| missing(to))?;

        Ok(self.graph.add_edge(from_index, to_index, weight))
    }

    /// Get the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if a node exists in the graph.
    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.id_to_node.contains_key(id)
    }

    /// Get the node index for an id.
    #[must_use]
    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_node.get(id).copied()
    }

    /// Get a node by id.
    #[must_use]
    pub fn get_node(&self, id: &str) -> Option<&GraphNode<N>> {
        self.node_index(id)
            .and_then(|idx| self.graph.node_weight(idx))
    }

    /// Iterate over all nodes in insertion order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &GraphNode<N>> {
        self.graph.node_weights()
    }

    /// Iterate over all edges as `(from, to, weight)`.
    pub fn iter_edges(&self) -> impl Iterator<Item = (&str, &str, &E)> {
        self.graph.edge_references().map(|edge| {
            (
                self.graph[edge.source()].id.as_str(),
                self.graph[edge.target()].id.as_str(),
                edge.weight(),
            )
        })
    }

    /// Ids of the nodes reachable over one outgoing edge.
    #[must_use]
    pub fn successors(&self, id: &str) -> Vec<&str> {
        self.neighbor_ids(id, Direction::Outgoing)
    }

    /// Ids of the nodes with an edge into `id`.
    #[must_use]
    pub fn predecessors(&self, id: &str) -> Vec<&str> {
        self.neighbor_ids(id, Direction::Incoming)
    }

    fn neighbor_ids(&self, id: &str, direction: Direction) -> Vec<&str> {
        let Some(index) = self.node_index(id) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        self.graph
            .neighbors_directed(index, direction)
            .filter(|n| seen.insert(*n))
            .map(|n| self.graph[n].id.as_str())
            .collect()
    }

    /// Check if the graph has cycles.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Find the shortest path `from -> ... -> to` following outgoing edges.
    ///
    /// Returns `None` if either node is unknown or `to` is unreachable. A
    /// path from a node to itself is `[id]`.
    #[must_use]
    pub fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let start = self.node_index(from)?;
        let goal = self.node_index(to)?;

        let mut parents: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            if current == goal {
                let mut path = vec![goal];
                let mut cursor = goal;
                while let Some(&parent) = parents.get(&cursor) {
                    path.push(parent);
                    cursor = parent;
                }
                path.reverse();
                return Some(
                    path.into_iter()
                        .map(|idx| self.graph[idx].id.clone())
                        .collect(),
                );
            }

            for next in self.graph.neighbors_directed(current, Direction::Outgoing) {
                if visited.insert(next) {
                    parents.insert(next, current);
                    queue.push_back(next);
                }
            }
        }

        None
    }

    /// Check whether adding `from -> to` would close a cycle.
    ///
    /// Returns the cycle the new edge would create, starting and ending at
    /// `from`: `[from, to, ..., from]`. Unknown ids cannot close a cycle
    /// unless `from == to`.
    #[must_use]
    pub fn would_create_cycle(&self, from: &str, to: &str) -> Option<Vec<String>> {
        if from == to {
            return Some(vec![from.to_string(), to.to_string()]);
        }

        let back = self.find_path(to, from)?;
        let mut cycle = Vec::with_capacity(back.len() + 1);
        cycle.push(from.to_string());
        cycle.extend(back);
        debug!(from, to, cycle = ?cycle, "Edge would close a cycle");
        Some(cycle)
    }

    /// Longest-path distance of every node from a source (a node with no
    /// incoming edges).
    ///
    /// Computed with Kahn's algorithm, so it always terminates. Nodes that sit
    /// on a cycle are never released by the walk; they keep the deepest level
    /// offered by an already layered predecessor, or `0` if there is none.
    #[must_use]
    pub fn levels(&self) -> HashMap<String, usize> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                (
                    idx,
                    self.graph.edges_directed(idx, Direction::Incoming).count(),
                )
            })
            .collect();

        let mut level: HashMap<NodeIndex, usize> = HashMap::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        for idx in self.graph.node_indices() {
            if in_degree.get(&idx).copied().unwrap_or(0) == 0 {
                level.insert(idx, 0);
                queue.push_back(idx);
            }
        }

        while let Some(current) = queue.pop_front() {
            let current_level = level.get(&current).copied().unwrap_or(0);
            for edge in self.graph.edges_directed(current, Direction::Outgoing) {
                let target = edge.target();
                let entry = level.entry(target).or_insert(0);
                *entry = (*entry).max(current_level + 1);

                if let Some(degree) = in_degree.get_mut(&target) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(target);
                    }
                }
            }
        }

        self.graph
            .node_indices()
            .map(|idx| {
                (
                    self.graph[idx].id.clone(),
                    level.get(&idx).copied().unwrap_or(0),
                )
            })
            .collect()
    }
}

impl<N: Clone, E> DependencyGraph<N, E> {
    /// Get topologically sorted list of nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn topological_sort(&self) -> Result<TopologicalOrder<N>> {
        match toposort(&self.graph, None) {
            Ok(sorted_indices) => Ok(sorted_indices
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(cycle) => Err(Error::CycleDetected {
                path: vec![self.graph[cycle.node_id()].id.clone()],
            }),
        }
    }

    /// Group nodes by [`levels`](Self::levels).
    ///
    /// Group `n` holds every node whose longest chain of predecessors has
    /// length `n`; within a group nodes keep insertion order.
    #[must_use]
    pub fn layers(&self) -> Layers<N> {
        let levels = self.levels();
        let mut layers: Layers<N> = vec![];

        for node in self.graph.node_weights() {
            let level = levels.get(&node.id).copied().unwrap_or(0);
            if level >= layers.len() {
                layers.resize(level + 1, vec![]);
            }
            layers[level].push(node.clone());
        }

        layers
    }
}

impl<N, E> Default for DependencyGraph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}
