//! Bulk dependency operations with per-entry outcomes.
//!
//! A batch runs sequentially under the service write lock. Each entry goes
//! through the same checks as the single-item operations, so a CREATE is
//! checked for cycles against everything committed before it, including
//! earlier entries of the same batch.

use crate::model::{DependencyId, DependencyType, TaskDependency, TaskId};
use crate::service::TaskGraphService;
use crate::store::{DependencyStore, TaskStore};
use crate::{Error, Result, ValidationKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, instrument, warn};

/// Operation applied to every entry of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkOperationKind {
    /// Create each dependency.
    Create,
    /// Delete each dependency.
    Delete,
    /// Change the type of each dependency.
    Update,
}

impl fmt::Display for BulkOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Update => "UPDATE",
        })
    }
}

fn default_true() -> bool {
    true
}

/// One entry of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDependencyItem {
    /// The waiting task.
    pub dependent_task_id: TaskId,
    /// The task waited on.
    pub blocking_task_id: TaskId,
    /// Type to create, or the current type for DELETE and UPDATE.
    #[serde(default, rename = "type")]
    pub dependency_type: DependencyType,
    /// Edge to delete or update. When absent the edge is looked up by its
    /// `(dependent, blocking, type)` triple.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_id: Option<DependencyId>,
    /// Target type for UPDATE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_type: Option<DependencyType>,
}

impl BulkDependencyItem {
    /// An entry for the `(dependent, blocking, type)` triple.
    pub fn new(
        dependent: impl Into<TaskId>,
        blocking: impl Into<TaskId>,
        dependency_type: DependencyType,
    ) -> Self {
        Self {
            dependent_task_id: dependent.into(),
            blocking_task_id: blocking.into(),
            dependency_type,
            dependency_id: None,
            new_type: None,
        }
    }

    /// Address an existing edge by id.
    #[must_use]
    pub fn with_id(mut self, id: DependencyId) -> Self {
        self.dependency_id = Some(id);
        self
    }

    /// Set the UPDATE target type.
    #[must_use]
    pub const fn with_new_type(mut self, new_type: DependencyType) -> Self {
        self.new_type = Some(new_type);
        self
    }

    fn triple(&self) -> (TaskId, TaskId, DependencyType) {
        (
            self.dependent_task_id.clone(),
            self.blocking_task_id.clone(),
            self.dependency_type,
        )
    }
}

/// A batch of dependency operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDependencyRequest {
    /// Operation applied to every entry.
    pub operation: BulkOperationKind,
    /// Entries, processed in order.
    pub dependencies: Vec<BulkDependencyItem>,
    /// Accepted for compatibility. Cycle checks always run.
    #[serde(default = "default_true")]
    pub validate_circular: bool,
}

impl BulkDependencyRequest {
    /// A request with cycle validation on.
    #[must_use]
    pub const fn new(operation: BulkOperationKind, dependencies: Vec<BulkDependencyItem>) -> Self {
        Self {
            operation,
            dependencies,
            validate_circular: true,
        }
    }
}

/// An entry that was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSuccess {
    /// Position in the request.
    pub index: usize,
    /// The waiting task.
    pub dependent_task_id: TaskId,
    /// The task waited on.
    pub blocking_task_id: TaskId,
    /// Type of the edge after the operation.
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    /// Created id for CREATE and UPDATE, removed id for DELETE.
    pub dependency_id: DependencyId,
}

/// An entry that was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    /// Position in the request.
    pub index: usize,
    /// The waiting task.
    pub dependent_task_id: TaskId,
    /// The task waited on.
    pub blocking_task_id: TaskId,
    /// Type named by the entry.
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    /// Error message.
    pub error: String,
    /// Stable error tag, e.g. `circular`.
    pub error_tag: String,
}

/// Per-entry outcome of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDependencyResult {
    /// The operation that ran.
    pub operation: BulkOperationKind,
    /// Applied entries.
    pub successful: Vec<BulkSuccess>,
    /// Rejected entries.
    pub failed: Vec<BulkFailure>,
    /// Non-fatal observations.
    pub warnings: Vec<String>,
}

impl BulkDependencyResult {
    /// `"N successful, M failed"`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} successful, {} failed",
            self.successful.len(),
            self.failed.len()
        )
    }
}

impl<T: TaskStore, D: DependencyStore> TaskGraphService<T, D> {
    /// Apply a batch of dependency operations.
    ///
    /// Entry failures are recorded in the result and never stop the batch.
    ///
    /// # Errors
    ///
    /// Returns `Validation/invalid-request` if the batch is empty or larger
    /// than `dependencies.maxBulkSize`.
    #[instrument(skip(self, request), fields(operation = %request.operation, entries = request.dependencies.len()))]
    pub fn bulk_dependency_operation(
        &self,
        request: &BulkDependencyRequest,
    ) -> Result<BulkDependencyResult> {
        let max = self.config.dependencies.max_bulk_size;
        if request.dependencies.is_empty() {
            return Err(Error::validation(
                ValidationKind::InvalidRequest,
                "Bulk request must contain at least one dependency",
            ));
        }
        if request.dependencies.len() > max {
            return Err(Error::validation(
                ValidationKind::InvalidRequest,
                format!(
                    "Bulk request holds {} dependencies, the maximum is {max}",
                    request.dependencies.len()
                ),
            ));
        }

        let mut result = BulkDependencyResult {
            operation: request.operation,
            successful: Vec::new(),
            failed: Vec::new(),
            warnings: Vec::new(),
        };
        if !request.validate_circular {
            result.warnings.push(
                "validateCircular=false was ignored, cycle checks always run".to_string(),
            );
        }

        let _guard = self.lock_writes();
        let mut first_seen: HashMap<(TaskId, TaskId, DependencyType), usize> = HashMap::new();

        for (index, item) in request.dependencies.iter().enumerate() {
            if let Some(first) = first_seen.get(&item.triple()) {
                result.warnings.push(format!(
                    "Entry {index} repeats entry {first}: {} {} {}",
                    item.dependent_task_id, item.dependency_type, item.blocking_task_id
                ));
            } else {
                first_seen.insert(item.triple(), index);
            }

            let outcome = match request.operation {
                BulkOperationKind::Create => self.create_dependency_locked(
                    &item.dependent_task_id,
                    &item.blocking_task_id,
                    item.dependency_type,
                ),
                BulkOperationKind::Delete => self.bulk_delete(item),
                BulkOperationKind::Update => self.bulk_update(item, &mut result.warnings),
            };

            match outcome {
                Ok(dependency) => result.successful.push(BulkSuccess {
                    index,
                    dependent_task_id: dependency.dependent_task_id,
                    blocking_task_id: dependency.blocking_task_id,
                    dependency_type: dependency.dependency_type,
                    dependency_id: dependency.id,
                }),
                Err(error) => {
                    warn!(index, error = %error, "Bulk entry failed");
                    result.failed.push(BulkFailure {
                        index,
                        dependent_task_id: item.dependent_task_id.clone(),
                        blocking_task_id: item.blocking_task_id.clone(),
                        dependency_type: item.dependency_type,
                        error: error.to_string(),
                        error_tag: error.tag().to_string(),
                    });
                }
            }
        }

        info!(summary = %result.summary(), "Bulk dependency operation finished");
        Ok(result)
    }

    /// Resolve the edge an entry refers to.
    fn locate(&self, item: &BulkDependencyItem) -> Result<TaskDependency> {
        let Some(id) = &item.dependency_id else {
            return self
                .dependencies
                .find(
                    &item.dependent_task_id,
                    &item.blocking_task_id,
                    item.dependency_type,
                )?
                .ok_or_else(|| {
                    Error::dependency_not_found(format!(
                        "{} {} {}",
                        item.dependent_task_id, item.dependency_type, item.blocking_task_id
                    ))
                });
        };

        let dependency = self
            .dependencies
            .get(id)?
            .ok_or_else(|| Error::dependency_not_found(id))?;
        if !dependency.is_triple(
            &item.dependent_task_id,
            &item.blocking_task_id,
            item.dependency_type,
        ) {
            return Err(Error::validation(
                ValidationKind::InvalidRequest,
                format!(
                    "Dependency {id} is {} {} {}, not the entry's pair",
                    dependency.dependent_task_id,
                    dependency.dependency_type,
                    dependency.blocking_task_id
                ),
            ));
        }
        Ok(dependency)
    }

    fn bulk_delete(&self, item: &BulkDependencyItem) -> Result<TaskDependency> {
        let dependency = self.locate(item)?;
        self.delete_dependency_locked(&dependency.id)?
            .ok_or_else(|| Error::dependency_not_found(&dependency.id))
    }

    /// Replace the edge with one of the new type, under a fresh id and at the
    /// same place in the store. The new edge is checked before anything is
    /// written.
    fn bulk_update(
        &self,
        item: &BulkDependencyItem,
        warnings: &mut Vec<String>,
    ) -> Result<TaskDependency> {
        let new_type = item.new_type.ok_or_else(|| {
            Error::validation(
                ValidationKind::InvalidRequest,
                "UPDATE entries require newType",
            )
        })?;
        let original = self.locate(item)?;
        if original.dependency_type == new_type {
            warnings.push(format!(
                "Dependency {} is already {new_type}, left unchanged",
                original.id
            ));
            return Ok(original);
        }

        // The original differs in type, so it neither conflicts with the new
        // triple nor sits in the blocking graph when the new type blocks.
        self.validate_new_dependency(
            &original.dependent_task_id,
            &original.blocking_task_id,
            new_type,
        )?;

        let updated = TaskDependency::new(
            original.dependent_task_id.clone(),
            original.blocking_task_id.clone(),
            new_type,
        );
        self.dependencies
            .replace(&original.id, updated.clone())?
            .ok_or_else(|| Error::dependency_not_found(&original.id))?;
        info!(
            old_id = %original.id,
            new_id = %updated.id,
            from = %original.dependency_type,
            to = %new_type,
            "Updated dependency type"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Task;
    use crate::store::InMemoryStore;
    use crate::TrellisConfig;
    use std::sync::Arc;

    fn service(ids: &[&str]) -> TaskGraphService<InMemoryStore, InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for id in ids {
            store.insert_task(Task::new(*id, id.to_uppercase(), *id, "web"));
        }
        TaskGraphService::new(store.clone(), store, TrellisConfig::default())
    }

    fn blocks(dependent: &str, blocking: &str) -> BulkDependencyItem {
        BulkDependencyItem::new(dependent, blocking, DependencyType::Blocks)
    }

    #[test]
    fn test_structural_validation() {
        let service = service(&["a", "b"]);
        let err = service
            .bulk_dependency_operation(&BulkDependencyRequest::new(BulkOperationKind::Create, vec![]))
            .unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::InvalidRequest));

        let mut config = TrellisConfig::default();
        config.dependencies.max_bulk_size = 1;
        let store = Arc::new(InMemoryStore::new());
        let service = TaskGraphService::new(store.clone(), store, config);
        let err = service
            .bulk_dependency_operation(&BulkDependencyRequest::new(
                BulkOperationKind::Create,
                vec![blocks("a", "b"), blocks("b", "a")],
            ))
            .unwrap_err();
        assert_eq!(err.tag(), "invalid-request");
    }

    #[test]
    fn test_duplicate_entries_warn_then_fail() {
        let service = service(&["a", "b"]);
        let result = service
            .bulk_dependency_operation(&BulkDependencyRequest::new(
                BulkOperationKind::Create,
                vec![blocks("a", "b"), blocks("a", "b")],
            ))
            .unwrap();

        assert_eq!(result.successful.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].index, 1);
        assert_eq!(result.failed[0].error_tag, "already-exists");
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("repeats entry 0"));
    }

    #[test]
    fn test_delete_by_id_and_triple() {
        let service = service(&["a", "b", "c"]);
        let first = service
            .create_dependency(&"a".into(), &"b".into(), DependencyType::Blocks)
            .unwrap();
        service
            .create_dependency(&"b".into(), &"c".into(), DependencyType::Blocks)
            .unwrap();

        let result = service
            .bulk_dependency_operation(&BulkDependencyRequest::new(
                BulkOperationKind::Delete,
                vec![
                    blocks("a", "b").with_id(first.id.clone()),
                    blocks("b", "c"),
                    blocks("c", "a"),
                ],
            ))
            .unwrap();

        assert_eq!(result.summary(), "2 successful, 1 failed");
        assert_eq!(result.successful[0].dependency_id, first.id);
        assert_eq!(result.failed[0].error_tag, "not-found");
        assert!(service.get_dependency(&first.id).is_err());
    }

    #[test]
    fn test_delete_rejects_mismatched_id() {
        let service = service(&["a", "b", "c"]);
        let dependency = service
            .create_dependency(&"a".into(), &"b".into(), DependencyType::Blocks)
            .unwrap();

        let result = service
            .bulk_dependency_operation(&BulkDependencyRequest::new(
                BulkOperationKind::Delete,
                vec![blocks("a", "c").with_id(dependency.id.clone())],
            ))
            .unwrap();

        assert_eq!(result.failed[0].error_tag, "invalid-request");
        assert!(service.get_dependency(&dependency.id).is_ok());
    }

    #[test]
    fn test_update_changes_type() {
        let service = service(&["a", "b"]);
        service
            .create_dependency(&"a".into(), &"b".into(), DependencyType::RelatesTo)
            .unwrap();

        let result = service
            .bulk_dependency_operation(&BulkDependencyRequest::new(
                BulkOperationKind::Update,
                vec![
                    BulkDependencyItem::new("a", "b", DependencyType::RelatesTo)
                        .with_new_type(DependencyType::Blocks),
                ],
            ))
            .unwrap();

        assert_eq!(result.successful.len(), 1);
        assert_eq!(result.successful[0].dependency_type, DependencyType::Blocks);
        let info = service.get_task_blocking_info(&"a".into()).unwrap();
        assert!(info.is_blocked);
    }

    #[test]
    fn test_rejected_update_restores_original() {
        let service = service(&["a", "b"]);
        service
            .create_dependency(&"a".into(), &"b".into(), DependencyType::Blocks)
            .unwrap();
        let original = service
            .create_dependency(&"b".into(), &"a".into(), DependencyType::RelatesTo)
            .unwrap();

        let result = service
            .bulk_dependency_operation(&BulkDependencyRequest::new(
                BulkOperationKind::Update,
                vec![
                    BulkDependencyItem::new("b", "a", DependencyType::RelatesTo)
                        .with_new_type(DependencyType::Blocks),
                ],
            ))
            .unwrap();

        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].error_tag, "circular");
        assert_eq!(service.get_dependency(&original.id).unwrap(), original);
    }

    #[test]
    fn test_update_keeps_store_order() {
        let store = Arc::new(InMemoryStore::new());
        for id in ["a", "b", "c", "d"] {
            store.insert_task(Task::new(id, id.to_uppercase(), id, "web"));
        }
        let service = TaskGraphService::new(store.clone(), store.clone(), TrellisConfig::default());
        service
            .create_dependency(&"a".into(), &"b".into(), DependencyType::Blocks)
            .unwrap();
        let related = service
            .create_dependency(&"b".into(), &"a".into(), DependencyType::RelatesTo)
            .unwrap();
        service
            .create_dependency(&"c".into(), &"d".into(), DependencyType::Blocks)
            .unwrap();
        let order = |store: &InMemoryStore| -> Vec<(String, String, DependencyType)> {
            store
                .snapshot()
                .dependencies
                .iter()
                .map(|d| {
                    (
                        d.dependent_task_id.to_string(),
                        d.blocking_task_id.to_string(),
                        d.dependency_type,
                    )
                })
                .collect()
        };
        let before = store.snapshot().dependencies;

        let rejected = service
            .bulk_dependency_operation(&BulkDependencyRequest::new(
                BulkOperationKind::Update,
                vec![
                    BulkDependencyItem::new("b", "a", DependencyType::RelatesTo)
                        .with_new_type(DependencyType::Blocks),
                ],
            ))
            .unwrap();
        assert_eq!(rejected.failed[0].error_tag, "circular");
        assert_eq!(store.snapshot().dependencies, before);

        let accepted = service
            .bulk_dependency_operation(&BulkDependencyRequest::new(
                BulkOperationKind::Update,
                vec![
                    BulkDependencyItem::new("b", "a", DependencyType::RelatesTo)
                        .with_new_type(DependencyType::Clones),
                ],
            ))
            .unwrap();
        assert_eq!(accepted.successful.len(), 1);
        assert_ne!(accepted.successful[0].dependency_id, related.id);
        assert_eq!(
            order(store.as_ref()),
            vec![
                ("a".to_string(), "b".to_string(), DependencyType::Blocks),
                ("b".to_string(), "a".to_string(), DependencyType::Clones),
                ("c".to_string(), "d".to_string(), DependencyType::Blocks),
            ]
        );
    }

    #[test]
    fn test_update_requires_new_type() {
        let service = service(&["a", "b"]);
        service
            .create_dependency(&"a".into(), &"b".into(), DependencyType::Blocks)
            .unwrap();

        let result = service
            .bulk_dependency_operation(&BulkDependencyRequest::new(
                BulkOperationKind::Update,
                vec![blocks("a", "b")],
            ))
            .unwrap();
        assert_eq!(result.failed[0].error_tag, "invalid-request");
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: BulkDependencyRequest = serde_json::from_str(
            r#"{
                "operation": "CREATE",
                "dependencies": [{"dependentTaskId": "a", "blockingTaskId": "b"}]
            }"#,
        )
        .unwrap();

        assert!(request.validate_circular);
        assert_eq!(request.dependencies[0].dependency_type, DependencyType::Blocks);
    }
}
