//! Store seams consumed by the core.
//!
//! Tasks and dependencies live behind two traits so the services can run
//! against any persistence layer. Implementations must be `Send + Sync` and
//! handle their own interior mutability; the service serializes writes that
//! need a consistent view.

mod memory;

pub use memory::{InMemoryStore, StoreSnapshot};

use crate::filter::DependencyFilter;
use crate::model::{DependencyId, DependencyType, ProjectId, Task, TaskDependency, TaskId, TaskStatus};
use crate::Result;

/// Read and hierarchy-write access to task records.
pub trait TaskStore: Send + Sync {
    /// Fetch a task, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or denies access.
    fn get_task(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Fetch only the status of a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or denies access.
    fn get_task_status(&self, id: &TaskId) -> Result<Option<TaskStatus>> {
        Ok(self.get_task(id)?.map(|task| task.status))
    }

    /// Set or clear the parent of a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist or the store fails.
    fn update_task_parent(&self, id: &TaskId, parent: Option<&TaskId>) -> Result<()>;

    /// Set the sibling ordinal of a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist or the store fails.
    fn update_task_position(&self, id: &TaskId, position: u32) -> Result<()>;

    /// Every task of a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or denies access.
    fn list_tasks_by_project(&self, project_id: &ProjectId) -> Result<Vec<Task>>;

    /// Direct children of a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or denies access.
    fn list_children(&self, parent: &TaskId) -> Result<Vec<Task>>;
}

/// Persistence for dependency edges.
pub trait DependencyStore: Send + Sync {
    /// Persist a new edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn insert(&self, dependency: TaskDependency) -> Result<()>;

    /// Remove an edge, returning it if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn remove(&self, id: &DependencyId) -> Result<Option<TaskDependency>>;

    /// Swap the edge `id` for `replacement`, returning the old edge if it
    /// existed. Stores that keep edges in order put the replacement in the
    /// old edge's place.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn replace(
        &self,
        id: &DependencyId,
        replacement: TaskDependency,
    ) -> Result<Option<TaskDependency>> {
        let removed = self.remove(id)?;
        if removed.is_some() {
            self.insert(replacement)?;
        }
        Ok(removed)
    }

    /// Fetch an edge by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn get(&self, id: &DependencyId) -> Result<Option<TaskDependency>>;

    /// Fetch the edge matching a `(dependent, blocking, type)` triple.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn find(
        &self,
        dependent: &TaskId,
        blocking: &TaskId,
        dependency_type: DependencyType,
    ) -> Result<Option<TaskDependency>>;

    /// Every edge matching the task, type and blocking criteria of `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn list(&self, filter: &DependencyFilter) -> Result<Vec<TaskDependency>>;
}
