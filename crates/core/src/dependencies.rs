//! Dependency graph engine: edge creation, deletion and blocking queries.

use crate::filter::{DependencyFilter, Direction};
use crate::model::{DependencyId, DependencyType, TaskDependency, TaskId, TaskStatus};
use crate::service::TaskGraphService;
use crate::store::{DependencyStore, TaskStore};
use crate::{Error, Result, ValidationKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument, warn};

/// The other end of a blocking edge, as reported by
/// [`TaskGraphService::get_task_blocking_info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingTask {
    /// The edge.
    pub dependency_id: DependencyId,
    /// The other task.
    pub task_id: TaskId,
    /// Its key, `None` if the task is missing from the store.
    pub key: Option<String>,
    /// Its title, `None` if the task is missing from the store.
    pub title: Option<String>,
    /// Its status, `None` if the task is missing from the store.
    pub status: Option<TaskStatus>,
    /// Whether the blocker of this edge has reached a terminal status.
    pub resolved: bool,
}

/// Blocking report for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBlockingInfo {
    /// The task.
    pub task_id: TaskId,
    /// Whether any blocker is unresolved.
    pub is_blocked: bool,
    /// Tasks this task waits on.
    pub blocked_by: Vec<BlockingTask>,
    /// Tasks waiting on this task.
    pub blocking: Vec<BlockingTask>,
    /// `!is_blocked`.
    pub can_start: bool,
}

/// Both sides of a task's dependency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependencies {
    /// Edges where the task is the dependent.
    pub dependencies: Vec<TaskDependency>,
    /// Edges where the task is the blocker.
    pub dependents: Vec<TaskDependency>,
}

impl<T: TaskStore, D: DependencyStore> TaskGraphService<T, D> {
    /// Create a dependency: `dependent` waits on `blocking`.
    ///
    /// # Errors
    ///
    /// - `Validation/self-dependency` if both ids are equal
    /// - `NotFound` if either task does not exist
    /// - `Conflict` if the same triple already exists
    /// - `Validation/circular` if a blocking edge would close a cycle; the
    ///   error carries the path `[blocking, dependent, ..., blocking]`
    #[instrument(skip(self))]
    pub fn create_dependency(
        &self,
        dependent: &TaskId,
        blocking: &TaskId,
        dependency_type: DependencyType,
    ) -> Result<TaskDependency> {
        let _guard = self.lock_writes();
        self.create_dependency_locked(dependent, blocking, dependency_type)
    }

    /// Check and insert. The caller must hold the write lock.
    pub(crate) fn create_dependency_locked(
        &self,
        dependent: &TaskId,
        blocking: &TaskId,
        dependency_type: DependencyType,
    ) -> Result<TaskDependency> {
        self.validate_new_dependency(dependent, blocking, dependency_type)?;

        let dependency = TaskDependency::new(dependent.clone(), blocking.clone(), dependency_type);
        self.dependencies.insert(dependency.clone())?;
        info!(
            id = %dependency.id,
            dependent = %dependent,
            blocking = %blocking,
            dependency_type = %dependency_type,
            "Created dependency"
        );
        Ok(dependency)
    }

    pub(crate) fn validate_new_dependency(
        &self,
        dependent: &TaskId,
        blocking: &TaskId,
        dependency_type: DependencyType,
    ) -> Result<()> {
        if dependent == blocking {
            return Err(Error::validation(
                ValidationKind::SelfDependency,
                format!("Task {dependent} cannot depend on itself"),
            ));
        }

        self.require_task(dependent)?;
        self.require_task(blocking)?;

        if self
            .dependencies
            .find(dependent, blocking, dependency_type)?
            .is_some()
        {
            return Err(Error::conflict(format!(
                "Dependency already exists: {dependent} {dependency_type} {blocking}"
            )));
        }

        if dependency_type.is_blocking() {
            let graph = self.blocking_graph()?;
            if let Some(cycle) = graph.would_create_cycle(blocking.as_str(), dependent.as_str()) {
                warn!(
                    dependent = %dependent,
                    blocking = %blocking,
                    cycle = ?cycle,
                    "Rejected dependency that would close a cycle"
                );
                return Err(Error::circular(cycle.into_iter().map(TaskId::from).collect()));
            }
        }

        Ok(())
    }

    /// Delete a dependency. Returns `false` if the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(skip(self))]
    pub fn delete_dependency(&self, id: &DependencyId) -> Result<bool> {
        let _guard = self.lock_writes();
        self.delete_dependency_locked(id).map(|removed| removed.is_some())
    }

    pub(crate) fn delete_dependency_locked(
        &self,
        id: &DependencyId,
    ) -> Result<Option<TaskDependency>> {
        let removed = self.dependencies.remove(id)?;
        if let Some(dependency) = &removed {
            info!(
                id = %id,
                dependent = %dependency.dependent_task_id,
                blocking = %dependency.blocking_task_id,
                "Deleted dependency"
            );
        }
        Ok(removed)
    }

    /// Fetch a dependency by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is unknown.
    pub fn get_dependency(&self, id: &DependencyId) -> Result<TaskDependency> {
        self.dependencies
            .get(id)?
            .ok_or_else(|| Error::dependency_not_found(id))
    }

    /// List dependencies matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `Validation/invalid-request` for a malformed filter, or a store
    /// error.
    pub fn list_dependencies(&self, filter: &DependencyFilter) -> Result<Vec<TaskDependency>> {
        filter.validate()?;
        let dependencies = self.dependencies.list(filter)?;

        let Some(project_id) = &filter.project_id else {
            return Ok(dependencies);
        };
        let members: HashSet<TaskId> = self
            .tasks
            .list_tasks_by_project(project_id)?
            .into_iter()
            .map(|task| task.id)
            .collect();
        Ok(dependencies
            .into_iter()
            .filter(|dependency| {
                members.contains(&dependency.dependent_task_id)
                    && members.contains(&dependency.blocking_task_id)
            })
            .collect())
    }

    /// Every edge touching a task, split by side.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist.
    pub fn list_task_dependencies(&self, task_id: &TaskId) -> Result<TaskDependencies> {
        self.require_task(task_id)?;
        let dependencies = self
            .dependencies
            .list(&DependencyFilter::new().for_task(task_id.clone(), Direction::Incoming))?;
        let dependents = self
            .dependencies
            .list(&DependencyFilter::new().for_task(task_id.clone(), Direction::Outgoing))?;
        Ok(TaskDependencies {
            dependencies,
            dependents,
        })
    }

    /// Report what blocks a task and what it blocks.
    ///
    /// A blocker missing from the task store counts as unresolved.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist.
    #[instrument(skip(self))]
    pub fn get_task_blocking_info(&self, task_id: &TaskId) -> Result<TaskBlockingInfo> {
        let task = self.require_task(task_id)?;
        let own_resolved = self.config.is_terminal(task.status);

        let mut blocked_by = Vec::new();
        for edge in self.dependencies.list(
            &DependencyFilter::new()
                .blocking()
                .for_task(task_id.clone(), Direction::Incoming),
        )? {
            let blocker = self.tasks.get_task(&edge.blocking_task_id)?;
            if blocker.is_none() {
                warn!(
                    task = %task_id,
                    blocker = %edge.blocking_task_id,
                    "Blocking task is missing from the store, treating it as unresolved"
                );
            }
            let resolved = blocker
                .as_ref()
                .is_some_and(|blocker| self.config.is_terminal(blocker.status));
            blocked_by.push(BlockingTask {
                dependency_id: edge.id,
                task_id: edge.blocking_task_id,
                key: blocker.as_ref().map(|t| t.key.clone()),
                title: blocker.as_ref().map(|t| t.title.clone()),
                status: blocker.map(|t| t.status),
                resolved,
            });
        }

        let mut blocking = Vec::new();
        for edge in self.dependencies.list(
            &DependencyFilter::new()
                .blocking()
                .for_task(task_id.clone(), Direction::Outgoing),
        )? {
            let dependent = self.tasks.get_task(&edge.dependent_task_id)?;
            blocking.push(BlockingTask {
                dependency_id: edge.id,
                task_id: edge.dependent_task_id,
                key: dependent.as_ref().map(|t| t.key.clone()),
                title: dependent.as_ref().map(|t| t.title.clone()),
                status: dependent.map(|t| t.status),
                resolved: own_resolved,
            });
        }

        let is_blocked = blocked_by.iter().any(|entry| !entry.resolved);
        Ok(TaskBlockingInfo {
            task_id: task_id.clone(),
            is_blocked,
            blocked_by,
            blocking,
            can_start: !is_blocked,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{DependencyType, Task, TaskStatus};
    use crate::store::InMemoryStore;
    use crate::{Error, TaskGraphService, TrellisConfig, ValidationKind};
    use std::sync::Arc;

    fn service(tasks: &[Task]) -> TaskGraphService<InMemoryStore, InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for task in tasks {
            store.insert_task(task.clone());
        }
        TaskGraphService::new(store.clone(), store, TrellisConfig::default())
    }

    fn tasks(ids: &[&str]) -> Vec<Task> {
        ids.iter()
            .map(|id| Task::new(*id, id.to_uppercase(), format!("Task {id}"), "web"))
            .collect()
    }

    #[test]
    fn test_self_dependency_checked_before_existence() {
        let service = service(&[]);
        let err = service
            .create_dependency(&"ghost".into(), &"ghost".into(), DependencyType::Blocks)
            .unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::SelfDependency));
    }

    #[test]
    fn test_missing_task() {
        let service = service(&tasks(&["a"]));
        let err = service
            .create_dependency(&"a".into(), &"ghost".into(), DependencyType::Blocks)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref id, .. } if id == "ghost"));
    }

    #[test]
    fn test_duplicate_triple_conflicts() {
        let service = service(&tasks(&["a", "b"]));
        service
            .create_dependency(&"a".into(), &"b".into(), DependencyType::Blocks)
            .unwrap();

        let err = service
            .create_dependency(&"a".into(), &"b".into(), DependencyType::Blocks)
            .unwrap_err();
        assert_eq!(err.tag(), "already-exists");

        // A different type is a different triple.
        assert!(
            service
                .create_dependency(&"a".into(), &"b".into(), DependencyType::RelatesTo)
                .is_ok()
        );
    }

    #[test]
    fn test_non_blocking_edges_skip_cycle_check() {
        let service = service(&tasks(&["a", "b"]));
        service
            .create_dependency(&"a".into(), &"b".into(), DependencyType::Blocks)
            .unwrap();

        assert!(
            service
                .create_dependency(&"b".into(), &"a".into(), DependencyType::RelatesTo)
                .is_ok()
        );
        let err = service
            .create_dependency(&"b".into(), &"a".into(), DependencyType::Blocks)
            .unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::Circular));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let service = service(&tasks(&["a", "b"]));
        let dependency = service
            .create_dependency(&"a".into(), &"b".into(), DependencyType::Blocks)
            .unwrap();

        assert!(service.delete_dependency(&dependency.id).unwrap());
        assert!(!service.delete_dependency(&dependency.id).unwrap());
        assert_eq!(
            service.get_dependency(&dependency.id).unwrap_err().tag(),
            "not-found"
        );
    }

    #[test]
    fn test_blocking_info_tracks_terminal_statuses() {
        let mut all = tasks(&["a", "b", "c"]);
        all[1].status = TaskStatus::Cancelled;
        let service = service(&all);
        service
            .create_dependency(&"a".into(), &"b".into(), DependencyType::Blocks)
            .unwrap();
        service
            .create_dependency(&"a".into(), &"c".into(), DependencyType::Duplicates)
            .unwrap();

        let info = service.get_task_blocking_info(&"a".into()).unwrap();
        assert!(!info.is_blocked);
        assert!(info.can_start);
        assert_eq!(info.blocked_by.len(), 1);
        assert!(info.blocked_by[0].resolved);

        let info = service.get_task_blocking_info(&"b".into()).unwrap();
        assert_eq!(info.blocking.len(), 1);
        assert_eq!(info.blocking[0].task_id.as_str(), "a");
    }

    #[test]
    fn test_list_task_dependencies() {
        let service = service(&tasks(&["a", "b", "c"]));
        service
            .create_dependency(&"b".into(), &"a".into(), DependencyType::Blocks)
            .unwrap();
        service
            .create_dependency(&"c".into(), &"b".into(), DependencyType::Blocks)
            .unwrap();

        let listed = service.list_task_dependencies(&"b".into()).unwrap();
        assert_eq!(listed.dependencies.len(), 1);
        assert_eq!(listed.dependencies[0].blocking_task_id.as_str(), "a");
        assert_eq!(listed.dependents.len(), 1);
        assert_eq!(listed.dependents[0].dependent_task_id.as_str(), "c");
    }
}
