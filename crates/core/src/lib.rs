//! Task dependency core for trellis.
//!
//! This crate owns the rules of the task graph of a project tracker:
//!
//! - **Dependencies**: directed edges between tasks. Blocking edges must stay
//!   acyclic, and a task cannot depend on itself or hold the same edge twice.
//! - **Hierarchy**: parent/child links with a maximum depth. A task can never
//!   become its own ancestor.
//! - **Derived views**: blocking info, subtask roll-ups, project dependency
//!   graphs and impact analysis.
//! - **Bulk operations**: batches with per-entry outcomes.
//!
//! Tasks and dependencies are read through the [`TaskStore`] and
//! [`DependencyStore`] traits. [`InMemoryStore`] implements both.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis_core::{DependencyType, InMemoryStore, Task, TaskGraphService, TrellisConfig};
//!
//! let store = Arc::new(InMemoryStore::new());
//! store.insert_task(Task::new("t1", "WEB-1", "Design", "web"));
//! store.insert_task(Task::new("t2", "WEB-2", "Build", "web"));
//! let service = TaskGraphService::new(store.clone(), store, TrellisConfig::default());
//!
//! service
//!     .create_dependency(&"t2".into(), &"t1".into(), DependencyType::Blocks)
//!     .unwrap();
//! assert!(service.get_task_blocking_info(&"t2".into()).unwrap().is_blocked);
//!
//! let err = service
//!     .create_dependency(&"t1".into(), &"t2".into(), DependencyType::Blocks)
//!     .unwrap_err();
//! assert_eq!(err.tag(), "circular");
//! ```

pub mod aggregation;
pub mod bulk;
pub mod config;
pub mod dependencies;
mod error;
pub mod filter;
pub mod hierarchy;
pub mod integrity;
pub mod model;
mod service;
pub mod store;

pub use aggregation::{
    ImpactAnalysis, ImpactLevel, ImpactedTask, ProjectDependencyGraph, ProjectGraphNode,
    SubtaskSummary, SummaryScope,
};
pub use bulk::{
    BulkDependencyItem, BulkDependencyRequest, BulkDependencyResult, BulkFailure,
    BulkOperationKind, BulkSuccess,
};
pub use config::TrellisConfig;
pub use dependencies::{BlockingTask, TaskBlockingInfo, TaskDependencies};
pub use error::{EntityKind, Error, ErrorKind, Result, ValidationKind};
pub use filter::{DependencyFilter, Direction};
pub use hierarchy::TaskTreeNode;
pub use integrity::IntegrityReport;
pub use model::{
    DependencyId, DependencyType, ProjectId, StatusCategory, Task, TaskDependency, TaskId,
    TaskStatus,
};
pub use service::TaskGraphService;
pub use store::{DependencyStore, InMemoryStore, StoreSnapshot, TaskStore};
