//! Bounded traversals over dependency graphs.
//!
//! Every walk here takes an explicit depth cap so that it terminates even if
//! the graph was loaded with a cycle in it.

use crate::{DependencyGraph, GraphNode};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet, VecDeque};

/// A topologically sorted sequence of nodes.
pub type TopologicalOrder<N> = Vec<GraphNode<N>>;

/// Nodes grouped by longest-path level, see [`DependencyGraph::layers`].
pub type Layers<N> = Vec<Vec<GraphNode<N>>>;

/// A node reached by [`DependencyGraph::reachable_within`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reached {
    /// Id of the reached node.
    pub id: String,
    /// Number of edges on the shortest path from the start node.
    pub distance: usize,
}

/// Result of a depth-capped reachability walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reachability {
    /// Reached nodes in breadth-first order, start node excluded.
    pub reached: Vec<Reached>,
    /// Whether the cap stopped the walk before every reachable node was seen.
    pub truncated: bool,
}

impl<N, E> DependencyGraph<N, E> {
    /// Every node reachable from `start` over outgoing edges, at most
    /// `max_depth` edges away.
    #[must_use]
    pub fn reachable_within(&self, start: &str, max_depth: usize) -> Reachability {
        let Some(start_index) = self.node_index(start) else {
            return Reachability::default();
        };

        let mut result = Reachability::default();
        let mut distance: HashMap<NodeIndex, usize> = HashMap::from([(start_index, 0)]);
        let mut queue = VecDeque::from([start_index]);

        while let Some(current) = queue.pop_front() {
            let current_distance = distance.get(&current).copied().unwrap_or(0);
            for next in self.graph.neighbors_directed(current, Direction::Outgoing) {
                if distance.contains_key(&next) {
                    continue;
                }
                if current_distance >= max_depth {
                    result.truncated = true;
                    continue;
                }
                distance.insert(next, current_distance + 1);
                result.reached.push(Reached {
                    id: self.graph[next].id.clone(),
                    distance: current_distance + 1,
                });
                queue.push_back(next);
            }
        }

        result
    }

    /// The longest chain `start -> ... -> end` over outgoing edges.
    ///
    /// The chain includes `start` and holds at most `max_depth + 1` nodes.
    /// Returns an empty chain for an unknown start.
    ///
    /// Each reachable node's longest chain is computed once, so the walk is
    /// linear in the reachable subgraph whatever the cap. Successors still on
    /// the current walk path are skipped, so cyclic input cannot loop.
    #[must_use]
    pub fn longest_chain_from(&self, start: &str, max_depth: usize) -> Vec<String> {
        let Some(start_index) = self.node_index(start) else {
            return Vec::new();
        };

        let mut height: HashMap<NodeIndex, usize> = HashMap::new();
        let mut next_on_chain: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut on_path = HashSet::from([start_index]);
        let mut stack = vec![(start_index, self.outgoing(start_index))];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            if let Some(next) = frame.1.pop() {
                if !on_path.contains(&next) && !height.contains_key(&next) {
                    on_path.insert(next);
                    stack.push((next, self.outgoing(next)));
                }
                continue;
            }

            stack.pop();
            on_path.remove(&node);
            // Successors without a height are on the walk path.
            let mut best: Option<(usize, NodeIndex)> = None;
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(&next_height) = height.get(&next)
                    && best.is_none_or(|(best_height, _)| next_height > best_height)
                {
                    best = Some((next_height, next));
                }
            }
            height.insert(node, best.map_or(1, |(best_height, _)| best_height + 1));
            if let Some((_, next)) = best {
                next_on_chain.insert(node, next);
            }
        }

        let mut chain = vec![start_index];
        let mut current = start_index;
        while chain.len() <= max_depth
            && let Some(&next) = next_on_chain.get(&current)
        {
            chain.push(next);
            current = next;
        }
        chain
            .into_iter()
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }

    /// Successors in reverse visiting order, for popping off a walk stack.
    fn outgoing(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut successors: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        successors.reverse();
        successors
    }
}
