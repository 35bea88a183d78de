//! Consistency check over stored dependencies.
//!
//! The service never writes a bad edge, but stores can be edited behind its
//! back. This report finds what such edits leave behind.

use crate::filter::DependencyFilter;
use crate::model::{DependencyId, DependencyType, TaskId};
use crate::service::TaskGraphService;
use crate::store::{DependencyStore, TaskStore};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument};

/// Findings of [`TaskGraphService::check_dependencies`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Whether nothing was found.
    pub is_valid: bool,
    /// Number of stored dependencies.
    pub dependency_count: usize,
    /// Cycles among blocking edges.
    pub cycles: Vec<Vec<TaskId>>,
    /// Edges with an endpoint missing from the task store.
    pub dangling: Vec<DependencyId>,
    /// Edges from a task to itself.
    pub self_dependencies: Vec<DependencyId>,
    /// Later copies of an already stored triple.
    pub duplicates: Vec<DependencyId>,
    /// Tasks in blocking order, empty when blocking edges form a cycle.
    pub blocking_order: Vec<TaskId>,
}

impl<T: TaskStore, D: DependencyStore> TaskGraphService<T, D> {
    /// Check every stored dependency against the graph invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if a store fails.
    #[instrument(skip(self))]
    pub fn check_dependencies(&self) -> Result<IntegrityReport> {
        let dependencies = self.dependencies.list(&DependencyFilter::new())?;

        let mut known: HashMap<TaskId, bool> = HashMap::new();
        let mut seen: HashSet<(TaskId, TaskId, DependencyType)> = HashSet::new();
        let mut dangling = Vec::new();
        let mut self_dependencies = Vec::new();
        let mut duplicates = Vec::new();

        for dependency in &dependencies {
            for endpoint in [&dependency.dependent_task_id, &dependency.blocking_task_id] {
                if !known.contains_key(endpoint) {
                    let exists = self.tasks.get_task(endpoint)?.is_some();
                    known.insert(endpoint.clone(), exists);
                }
            }
            let missing = [&dependency.dependent_task_id, &dependency.blocking_task_id]
                .iter()
                .any(|endpoint| known.get(*endpoint) == Some(&false));
            if missing {
                dangling.push(dependency.id.clone());
            }
            if dependency.dependent_task_id == dependency.blocking_task_id {
                self_dependencies.push(dependency.id.clone());
            }
            if !seen.insert((
                dependency.dependent_task_id.clone(),
                dependency.blocking_task_id.clone(),
                dependency.dependency_type,
            )) {
                duplicates.push(dependency.id.clone());
            }
        }

        let graph = self.blocking_graph()?;
        let validation = graph.validate();
        let cycles: Vec<Vec<TaskId>> = validation
            .cycles
            .into_iter()
            .map(|cycle| cycle.into_iter().map(TaskId::from).collect())
            .collect();
        let blocking_order = graph
            .topological_sort()
            .map(|order| order.into_iter().map(|node| TaskId::from(node.id)).collect())
            .unwrap_or_default();

        let is_valid = validation.is_valid
            && dangling.is_empty()
            && self_dependencies.is_empty()
            && duplicates.is_empty();
        info!(
            dependencies = dependencies.len(),
            cycles = cycles.len(),
            dangling = dangling.len(),
            is_valid,
            "Checked stored dependencies"
        );

        Ok(IntegrityReport {
            is_valid,
            dependency_count: dependencies.len(),
            cycles,
            dangling,
            self_dependencies,
            duplicates,
            blocking_order,
        })
    }
}
