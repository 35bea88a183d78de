//! Typed query filter for dependency listings.

use crate::model::{DependencyType, ProjectId, TaskDependency, TaskId};
use crate::{Error, Result, ValidationKind};
use serde::{Deserialize, Serialize};

/// Which side of an edge a task must sit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// The task is the dependent (edges pointing at it).
    Incoming,
    /// The task is the blocker (edges leaving it).
    Outgoing,
    /// Either side.
    #[default]
    Both,
}

/// Restrict a listing to the edges touching one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskScope {
    /// The task.
    pub task_id: TaskId,
    /// Which side of the edge the task must be on.
    #[serde(default)]
    pub direction: Direction,
}

/// Filter for [`DependencyStore::list`](crate::DependencyStore::list).
///
/// Every field is optional; an empty filter matches every edge. `project_id`
/// is applied by the service, which knows task membership, and is ignored by
/// stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DependencyFilter {
    /// Only edges touching this task.
    pub task: Option<TaskScope>,
    /// Only edges of this type.
    pub dependency_type: Option<DependencyType>,
    /// Only edges with blocking semantics.
    pub blocking_only: bool,
    /// Only edges whose endpoints both belong to this project.
    pub project_id: Option<ProjectId>,
}

impl DependencyFilter {
    /// A filter matching every edge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only edges touching `task_id` on the given side.
    #[must_use]
    pub fn for_task(mut self, task_id: TaskId, direction: Direction) -> Self {
        self.task = Some(TaskScope { task_id, direction });
        self
    }

    /// Only edges of `dependency_type`.
    #[must_use]
    pub fn of_type(mut self, dependency_type: DependencyType) -> Self {
        self.dependency_type = Some(dependency_type);
        self
    }

    /// Only blocking edges.
    #[must_use]
    pub fn blocking(mut self) -> Self {
        self.blocking_only = true;
        self
    }

    /// Only edges inside `project_id`.
    #[must_use]
    pub fn in_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Reject filters carrying empty ids.
    ///
    /// # Errors
    ///
    /// Returns an `invalid-request` validation error.
    pub fn validate(&self) -> Result<()> {
        if let Some(scope) = &self.task
            && scope.task_id.as_str().trim().is_empty()
        {
            return Err(Error::validation(
                ValidationKind::InvalidRequest,
                "Dependency filter task id must not be empty",
            ));
        }
        if let Some(project_id) = &self.project_id
            && project_id.as_str().trim().is_empty()
        {
            return Err(Error::validation(
                ValidationKind::InvalidRequest,
                "Dependency filter project id must not be empty",
            ));
        }
        Ok(())
    }

    /// Whether `dependency` passes the task, type and blocking criteria.
    #[must_use]
    pub fn matches(&self, dependency: &TaskDependency) -> bool {
        if self.blocking_only && !dependency.dependency_type.is_blocking() {
            return false;
        }
        if let Some(kind) = self.dependency_type
            && dependency.dependency_type != kind
        {
            return false;
        }
        match &self.task {
            None => true,
            Some(TaskScope {
                task_id,
                direction: Direction::Incoming,
            }) => dependency.dependent_task_id == *task_id,
            Some(TaskScope {
                task_id,
                direction: Direction::Outgoing,
            }) => dependency.blocking_task_id == *task_id,
            Some(TaskScope {
                task_id,
                direction: Direction::Both,
            }) => dependency.dependent_task_id == *task_id || dependency.blocking_task_id == *task_id,
        }
    }
}
