use super::{DependencyStore, TaskStore};
use crate::filter::DependencyFilter;
use crate::model::{DependencyId, DependencyType, ProjectId, Task, TaskDependency, TaskId};
use crate::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Serializable content of an [`InMemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSnapshot {
    /// Task records.
    pub tasks: Vec<Task>,
    /// Dependency edges, in insertion order.
    pub dependencies: Vec<TaskDependency>,
}

/// Task and dependency store held in memory.
///
/// Implements both store traits, so one instance can back both sides of a
/// [`TaskGraphService`](crate::TaskGraphService). The CLI persists it as a
/// JSON [`StoreSnapshot`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tasks: RwLock<BTreeMap<TaskId, Task>>,
    dependencies: RwLock<Vec<TaskDependency>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot. A repeated task id replaces the
    /// earlier record.
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut tasks = BTreeMap::new();
        for task in snapshot.tasks {
            if let Some(previous) = tasks.insert(task.id.clone(), task) {
                tracing::warn!(task = %previous.id, "Duplicate task id in snapshot, keeping the last record");
            }
        }
        Self {
            tasks: RwLock::new(tasks),
            dependencies: RwLock::new(snapshot.dependencies),
        }
    }

    /// Copy the current content out.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            tasks: self.tasks.read().values().cloned().collect(),
            dependencies: self.dependencies.read().clone(),
        }
    }

    /// Add or replace a task record.
    pub fn insert_task(&self, task: Task) {
        self.tasks.write().insert(task.id.clone(), task);
    }

    /// Number of stored tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }

    /// Load a JSON snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a configuration
    /// error if it is not a valid snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content).map_err(|e| {
            Error::configuration(format!("Invalid store snapshot {}: {e}", path.display()))
        })?;
        tracing::debug!(
            path = %path.display(),
            tasks = snapshot.tasks.len(),
            dependencies = snapshot.dependencies.len(),
            "Loaded store snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current content as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| Error::internal(format!("Failed to serialize store snapshot: {e}")))?;
        std::fs::write(path, json).map_err(|e| Error::io(e, path, "write"))?;
        tracing::debug!(path = %path.display(), "Saved store snapshot");
        Ok(())
    }
}

impl TaskStore for InMemoryStore {
    fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.tasks.read().get(id).cloned())
    }

    fn update_task_parent(&self, id: &TaskId, parent: Option<&TaskId>) -> Result<()> {
        let mut tasks = self.tasks.write();
        let task = tasks.get_mut(id).ok_or_else(|| Error::task_not_found(id))?;
        task.parent_task_id = parent.cloned();
        Ok(())
    }

    fn update_task_position(&self, id: &TaskId, position: u32) -> Result<()> {
        let mut tasks = self.tasks.write();
        let task = tasks.get_mut(id).ok_or_else(|| Error::task_not_found(id))?;
        task.position = Some(position);
        Ok(())
    }

    fn list_tasks_by_project(&self, project_id: &ProjectId) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .read()
            .values()
            .filter(|task| task.project_id == *project_id)
            .cloned()
            .collect())
    }

    fn list_children(&self, parent: &TaskId) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .read()
            .values()
            .filter(|task| task.parent_task_id.as_ref() == Some(parent))
            .cloned()
            .collect())
    }
}

impl DependencyStore for InMemoryStore {
    fn insert(&self, dependency: TaskDependency) -> Result<()> {
        let mut dependencies = self.dependencies.write();
        if dependencies.iter().any(|existing| existing.id == dependency.id) {
            return Err(Error::internal(format!(
                "Dependency id {} is already stored",
                dependency.id
            )));
        }
        dependencies.push(dependency);
        Ok(())
    }

    fn remove(&self, id: &DependencyId) -> Result<Option<TaskDependency>> {
        let mut dependencies = self.dependencies.write();
        Ok(dependencies
            .iter()
            .position(|dependency| dependency.id == *id)
            .map(|index| dependencies.remove(index)))
    }

    fn replace(
        &self,
        id: &DependencyId,
        replacement: TaskDependency,
    ) -> Result<Option<TaskDependency>> {
        let mut dependencies = self.dependencies.write();
        if replacement.id != *id
            && dependencies.iter().any(|existing| existing.id == replacement.id)
        {
            return Err(Error::internal(format!(
                "Dependency id {} is already stored",
                replacement.id
            )));
        }
        Ok(dependencies
            .iter_mut()
            .find(|dependency| dependency.id == *id)
            .map(|slot| std::mem::replace(slot, replacement)))
    }

    fn get(&self, id: &DependencyId) -> Result<Option<TaskDependency>> {
        Ok(self
            .dependencies
            .read()
            .iter()
            .find(|dependency| dependency.id == *id)
            .cloned())
    }

    fn find(
        &self,
        dependent: &TaskId,
        blocking: &TaskId,
        dependency_type: DependencyType,
    ) -> Result<Option<TaskDependency>> {
        Ok(self
            .dependencies
            .read()
            .iter()
            .find(|dependency| dependency.is_triple(dependent, blocking, dependency_type))
            .cloned())
    }

    fn list(&self, filter: &DependencyFilter) -> Result<Vec<TaskDependency>> {
        Ok(self
            .dependencies
            .read()
            .iter()
            .filter(|dependency| filter.matches(dependency))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Direction;
    use tempfile::TempDir;

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_task(Task::new("t1", "WEB-1", "Login", "web"));
        store.insert_task(Task::new("t2", "WEB-2", "Signup", "web").with_parent("t1"));
        store.insert_task(Task::new("t3", "OPS-1", "Deploy", "ops"));
        store
    }

    #[test]
    fn test_task_queries() {
        let store = store();

        assert_eq!(store.list_tasks_by_project(&"web".into()).unwrap().len(), 2);
        let children = store.list_children(&"t1".into()).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id.as_str(), "t2");
        assert!(store.get_task(&"ghost".into()).unwrap().is_none());
    }

    #[test]
    fn test_update_parent_and_position() {
        let store = store();
        store.update_task_parent(&"t2".into(), None).unwrap();
        store.update_task_position(&"t2".into(), 4).unwrap();

        let task = store.get_task(&"t2".into()).unwrap().unwrap();
        assert!(task.parent_task_id.is_none());
        assert_eq!(task.position, Some(4));

        let err = store.update_task_parent(&"ghost".into(), None).unwrap_err();
        assert_eq!(err.tag(), "not-found");
    }

    #[test]
    fn test_dependency_crud() {
        let store = store();
        let dependency = TaskDependency::new("t2".into(), "t1".into(), DependencyType::Blocks);
        let id = dependency.id.clone();
        store.insert(dependency.clone()).unwrap();

        assert_eq!(store.get(&id).unwrap(), Some(dependency.clone()));
        assert!(
            store
                .find(&"t2".into(), &"t1".into(), DependencyType::Blocks)
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .find(&"t2".into(), &"t1".into(), DependencyType::Clones)
                .unwrap()
                .is_none()
        );
        assert!(store.insert(dependency).is_err());

        let incoming = store
            .list(&DependencyFilter::new().for_task("t2".into(), Direction::Incoming))
            .unwrap();
        assert_eq!(incoming.len(), 1);

        assert!(store.remove(&id).unwrap().is_some());
        assert!(store.remove(&id).unwrap().is_none());
    }

    #[test]
    fn test_replace_keeps_position() {
        let store = store();
        let first = TaskDependency::new("t2".into(), "t1".into(), DependencyType::RelatesTo);
        let second = TaskDependency::new("t1".into(), "t2".into(), DependencyType::Blocks);
        store.insert(first.clone()).unwrap();
        store.insert(second.clone()).unwrap();

        let replacement = TaskDependency::new("t2".into(), "t1".into(), DependencyType::Clones);
        let old = store.replace(&first.id, replacement.clone()).unwrap();

        assert_eq!(old, Some(first.clone()));
        assert_eq!(store.snapshot().dependencies, vec![replacement, second.clone()]);

        let fresh = TaskDependency::new("t1".into(), "t2".into(), DependencyType::Clones);
        assert!(store.replace(&first.id, fresh).unwrap().is_none());
        assert!(store.replace(&second.id, second.clone()).unwrap().is_some());
        assert!(store.replace(&second.id, first).is_ok());
    }

    #[test]
    fn test_snapshot_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trellis.json");

        let store = store();
        store
            .insert(TaskDependency::new("t2".into(), "t1".into(), DependencyType::Blocks))
            .unwrap();
        store.save(&path).unwrap();

        let loaded = InMemoryStore::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = InMemoryStore::load(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.tag(), "io");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = InMemoryStore::load(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
