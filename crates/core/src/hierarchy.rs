//! Hierarchy manager: parent/child moves, trees and breadcrumbs.
//!
//! Top-level tasks sit at depth 0. A move is accepted when the deepest task
//! of the moved subtree stays within `hierarchy.maxDepth`.

use crate::model::{Task, TaskId, TaskStatus};
use crate::service::TaskGraphService;
use crate::store::{DependencyStore, TaskStore};
use crate::{Error, Result, ValidationKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument, warn};

/// Upper bound on parent-chain walks over stored data.
pub const ANCESTRY_WALK_LIMIT: usize = 4096;

/// A task and its expanded children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTreeNode {
    /// The task.
    pub task_id: TaskId,
    /// Task key.
    pub key: String,
    /// Task title.
    pub title: String,
    /// Task status.
    pub status: TaskStatus,
    /// Levels below the tree root.
    pub depth: usize,
    /// Whether the task has children, expanded or not.
    pub has_children: bool,
    /// Expanded children, ordered by position then key.
    pub children: Vec<TaskTreeNode>,
}

impl<T: TaskStore, D: DependencyStore> TaskGraphService<T, D> {
    /// Move a task under a new parent, or to the top level with `None`.
    ///
    /// `position` sets the sibling ordinal. Nothing is written unless every
    /// check passes.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the task or the new parent does not exist
    /// - `Validation/circular-reference` if the new parent is the task or
    ///   one of its descendants
    /// - `Validation/max-depth-exceeded` if the subtree would sink below the
    ///   maximum depth
    #[instrument(skip(self))]
    pub fn move_task(
        &self,
        task_id: &TaskId,
        new_parent: Option<&TaskId>,
        position: Option<u32>,
    ) -> Result<Task> {
        let _guard = self.lock_writes();
        self.require_task(task_id)?;

        let new_depth = match new_parent {
            None => 0,
            Some(parent_id) => {
                let parent = self.require_task(parent_id)?;
                if parent_id == task_id {
                    return Err(Error::validation(
                        ValidationKind::CircularReference,
                        format!("Task {task_id} cannot be its own parent"),
                    ));
                }
                let ancestors = self.ancestors_of(&parent)?;
                if ancestors.iter().any(|ancestor| ancestor.id == *task_id) {
                    return Err(Error::validation(
                        ValidationKind::CircularReference,
                        format!("Cannot move task {task_id} under its own descendant {parent_id}"),
                    ));
                }
                ancestors.len() + 1
            }
        };

        let height = self.subtree_height(task_id)?;
        let max_depth = self.config.hierarchy.max_depth;
        if new_depth + height > max_depth {
            return Err(Error::validation(
                ValidationKind::MaxDepthExceeded,
                format!(
                    "Moving task {task_id} would place a subtask at depth {}, the maximum is {max_depth}",
                    new_depth + height
                ),
            ));
        }

        self.tasks.update_task_parent(task_id, new_parent)?;
        if let Some(position) = position {
            self.tasks.update_task_position(task_id, position)?;
        }
        info!(
            task = %task_id,
            parent = ?new_parent.map(TaskId::as_str),
            depth = new_depth,
            "Moved task"
        );
        self.require_task(task_id)
    }

    /// Build the tree rooted at a task.
    ///
    /// Expands `max_depth` levels below the root, defaulting to
    /// `hierarchy.defaultTreeDepth`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist.
    #[instrument(skip(self))]
    pub fn get_task_tree(&self, task_id: &TaskId, max_depth: Option<usize>) -> Result<TaskTreeNode> {
        let root = self.require_task(task_id)?;
        let max_depth = max_depth.unwrap_or(self.config.hierarchy.default_tree_depth);
        let mut path = HashSet::new();
        self.tree_node(root, 0, max_depth, &mut path)
    }

    fn tree_node(
        &self,
        task: Task,
        depth: usize,
        max_depth: usize,
        path: &mut HashSet<TaskId>,
    ) -> Result<TaskTreeNode> {
        let mut children = self.tasks.list_children(&task.id)?;
        let has_children = !children.is_empty();

        let mut nodes = Vec::new();
        if depth < max_depth && has_children {
            sort_siblings(&mut children);
            path.insert(task.id.clone());
            for child in children {
                if path.contains(&child.id) {
                    warn!(task = %task.id, child = %child.id, "Hierarchy loop, skipping branch");
                    continue;
                }
                nodes.push(self.tree_node(child, depth + 1, max_depth, path)?);
            }
            path.remove(&task.id);
        }

        Ok(TaskTreeNode {
            task_id: task.id,
            key: task.key,
            title: task.title,
            status: task.status,
            depth,
            has_children,
            children: nodes,
        })
    }

    /// Ancestors of a task, root first, ending with the task itself.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist, or `Internal` if the
    /// stored parent chain loops.
    pub fn get_task_path(&self, task_id: &TaskId) -> Result<Vec<Task>> {
        let task = self.require_task(task_id)?;
        let mut path = self.ancestors_of(&task)?;
        path.reverse();
        path.push(task);
        Ok(path)
    }

    /// Number of ancestors of a task; top-level tasks are at depth 0.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist, or `Internal` if the
    /// stored parent chain loops.
    pub fn get_task_depth(&self, task_id: &TaskId) -> Result<usize> {
        let task = self.require_task(task_id)?;
        Ok(self.ancestors_of(&task)?.len())
    }

    /// Parents of `task`, nearest first. A dangling parent id ends the chain.
    fn ancestors_of(&self, task: &Task) -> Result<Vec<Task>> {
        let mut ancestors: Vec<Task> = Vec::new();
        let mut seen = HashSet::from([task.id.clone()]);
        let mut next = task.parent_task_id.clone();

        while let Some(parent_id) = next {
            if !seen.insert(parent_id.clone()) || ancestors.len() >= ANCESTRY_WALK_LIMIT {
                return Err(Error::internal(format!(
                    "Parent chain of task {} loops through {parent_id}",
                    task.id
                )));
            }
            let Some(parent) = self.tasks.get_task(&parent_id)? else {
                warn!(task = %task.id, parent = %parent_id, "Parent task is missing from the store");
                break;
            };
            next = parent.parent_task_id.clone();
            ancestors.push(parent);
        }

        Ok(ancestors)
    }

    /// Levels between a task and its deepest descendant.
    fn subtree_height(&self, task_id: &TaskId) -> Result<usize> {
        let mut height = 0;
        let mut seen = HashSet::from([task_id.clone()]);
        let mut stack = vec![(task_id.clone(), 0usize)];

        while let Some((current, depth)) = stack.pop() {
            height = height.max(depth);
            for child in self.tasks.list_children(&current)? {
                if !seen.insert(child.id.clone()) || depth >= ANCESTRY_WALK_LIMIT {
                    return Err(Error::internal(format!(
                        "Subtree of task {task_id} loops through {}",
                        child.id
                    )));
                }
                stack.push((child.id, depth + 1));
            }
        }

        Ok(height)
    }
}

fn sort_siblings(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.position
            .unwrap_or(u32::MAX)
            .cmp(&b.position.unwrap_or(u32::MAX))
            .then_with(|| a.key.cmp(&b.key))
    });
}

#[cfg(test)]
mod tests {
    use crate::model::Task;
    use crate::store::{InMemoryStore, TaskStore};
    use crate::{TaskGraphService, TrellisConfig, ValidationKind};
    use std::sync::Arc;

    /// `a > b > c`, plus a lone `x`.
    fn service() -> TaskGraphService<InMemoryStore, InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.insert_task(Task::new("a", "A", "Epic", "web"));
        store.insert_task(Task::new("b", "B", "Story", "web").with_parent("a"));
        store.insert_task(Task::new("c", "C", "Subtask", "web").with_parent("b"));
        store.insert_task(Task::new("x", "X", "Lone", "web"));
        TaskGraphService::new(store.clone(), store, TrellisConfig::default())
    }

    #[test]
    fn test_depth_and_path() {
        let service = service();
        assert_eq!(service.get_task_depth(&"a".into()).unwrap(), 0);
        assert_eq!(service.get_task_depth(&"c".into()).unwrap(), 2);

        let path: Vec<String> = service
            .get_task_path(&"c".into())
            .unwrap()
            .into_iter()
            .map(|task| task.key)
            .collect();
        assert_eq!(path, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_move_under_descendant_is_rejected() {
        let service = service();
        let err = service.move_task(&"a".into(), Some(&"c".into()), None).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::CircularReference));

        let err = service.move_task(&"a".into(), Some(&"a".into()), None).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::CircularReference));

        // Nothing changed.
        let a = service.task_store().get_task(&"a".into()).unwrap().unwrap();
        assert!(a.parent_task_id.is_none());
    }

    #[test]
    fn test_move_sets_parent_and_position() {
        let service = service();
        let moved = service.move_task(&"x".into(), Some(&"b".into()), Some(2)).unwrap();
        assert_eq!(moved.parent_task_id.as_ref().map(|id| id.as_str()), Some("b"));
        assert_eq!(moved.position, Some(2));

        let moved = service.move_task(&"x".into(), None, None).unwrap();
        assert!(moved.parent_task_id.is_none());
    }

    #[test]
    fn test_move_respects_max_depth() {
        let mut config = TrellisConfig::default();
        config.hierarchy.max_depth = 3;
        let store = Arc::new(InMemoryStore::new());
        for (id, parent) in [("a", None), ("b", Some("a")), ("c", Some("b")), ("d", Some("c"))] {
            let task = Task::new(id, id.to_uppercase(), id, "web");
            store.insert_task(match parent {
                Some(parent) => task.with_parent(parent),
                None => task,
            });
        }
        store.insert_task(Task::new("p", "P", "Leaf parent", "web"));
        store.insert_task(Task::new("q", "Q", "Child", "web").with_parent("p"));
        let service = TaskGraphService::new(store.clone(), store, config);

        // d is at depth 3; q's subtree has height 0 but would land at depth 4.
        let err = service.move_task(&"q".into(), Some(&"d".into()), None).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::MaxDepthExceeded));

        // p has one level below it: under c it spans depths 3..=4.
        let err = service.move_task(&"p".into(), Some(&"c".into()), None).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::MaxDepthExceeded));

        assert!(service.move_task(&"p".into(), Some(&"b".into()), None).is_ok());
    }

    #[test]
    fn test_tree_marks_children_at_cutoff() {
        let service = service();
        let tree = service.get_task_tree(&"a".into(), Some(1)).unwrap();

        assert!(tree.has_children);
        assert_eq!(tree.children.len(), 1);
        let b = &tree.children[0];
        assert_eq!(b.depth, 1);
        assert!(b.has_children);
        assert!(b.children.is_empty());

        let full = service.get_task_tree(&"a".into(), None).unwrap();
        assert_eq!(full.children[0].children[0].task_id.as_str(), "c");
        assert!(!full.children[0].children[0].has_children);
    }

    #[test]
    fn test_tree_orders_siblings_by_position() {
        let service = service();
        service.move_task(&"x".into(), Some(&"a".into()), Some(0)).unwrap();

        let tree = service.get_task_tree(&"a".into(), Some(1)).unwrap();
        let keys: Vec<&str> = tree.children.iter().map(|node| node.key.as_str()).collect();
        assert_eq!(keys, vec!["X", "B"]);
    }

    #[test]
    fn test_looping_parent_chain_is_internal_error() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_task(Task::new("a", "A", "a", "web").with_parent("b"));
        store.insert_task(Task::new("b", "B", "b", "web").with_parent("a"));
        let service = TaskGraphService::new(store.clone(), store, TrellisConfig::default());

        assert_eq!(service.get_task_depth(&"a".into()).unwrap_err().tag(), "internal");
    }
}
