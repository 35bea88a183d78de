//! Task and dependency records.
//!
//! Tasks are owned by the task store; the core only references them by id.
//! Dependencies are directed edges between two tasks, kept in the dependency
//! store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an opaque id. The format is not validated.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

id_type!(
    /// Opaque task identifier.
    TaskId
);
id_type!(
    /// Opaque project identifier.
    ProjectId
);
id_type!(
    /// Identifier of a dependency edge, assigned on insertion.
    DependencyId
);

impl DependencyId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Workflow status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not yet scheduled.
    Backlog,
    /// Scheduled, not started.
    #[default]
    Todo,
    /// Being worked on.
    InProgress,
    /// Waiting for review.
    InReview,
    /// Flagged as blocked by the team.
    Blocked,
    /// Finished.
    Done,
    /// Abandoned.
    Cancelled,
}

/// Coarse grouping of [`TaskStatus`] used by roll-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCategory {
    /// Work has not started.
    Pending,
    /// Work is underway.
    Active,
    /// Work is over.
    Terminal,
}

impl TaskStatus {
    /// Every status, in workflow order.
    pub const ALL: [Self; 7] = [
        Self::Backlog,
        Self::Todo,
        Self::InProgress,
        Self::InReview,
        Self::Blocked,
        Self::Done,
        Self::Cancelled,
    ];

    /// The fixed category of this status.
    #[must_use]
    pub const fn category(self) -> StatusCategory {
        match self {
            Self::Backlog | Self::Todo | Self::Blocked => StatusCategory::Pending,
            Self::InProgress | Self::InReview => StatusCategory::Active,
            Self::Done | Self::Cancelled => StatusCategory::Terminal,
        }
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "BACKLOG",
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::InReview => "IN_REVIEW",
            Self::Blocked => "BLOCKED",
            Self::Done => "DONE",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("Unknown task status: {s}"))
    }
}

/// Kind of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    /// The dependent cannot start until the blocker is in a terminal status.
    #[default]
    Blocks,
    /// Informational link.
    RelatesTo,
    /// The dependent duplicates the other task.
    Duplicates,
    /// The dependent was cloned from the other task.
    Clones,
}

impl DependencyType {
    /// Every dependency type.
    pub const ALL: [Self; 4] = [Self::Blocks, Self::RelatesTo, Self::Duplicates, Self::Clones];

    /// Whether edges of this type take part in blocking and cycle checks.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Blocks)
    }

    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "BLOCKS",
            Self::RelatesTo => "RELATES_TO",
            Self::Duplicates => "DUPLICATES",
            Self::Clones => "CLONES",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("Unknown dependency type: {s}"))
    }
}

/// A task record as seen by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task id.
    pub id: TaskId,
    /// Human-facing key, e.g. `WEB-42`.
    pub key: String,
    /// Title.
    pub title: String,
    /// Current workflow status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Owning project.
    pub project_id: ProjectId,
    /// Parent task, for subtasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    /// Estimated effort in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    /// Logged effort in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_hours: Option<f64>,
    /// Ordinal among siblings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl Task {
    /// Create a top-level task in `TODO`.
    pub fn new(
        id: impl Into<TaskId>,
        key: impl Into<String>,
        title: impl Into<String>,
        project_id: impl Into<ProjectId>,
    ) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            title: title.into(),
            status: TaskStatus::default(),
            project_id: project_id.into(),
            parent_task_id: None,
            estimated_hours: None,
            logged_hours: None,
            position: None,
        }
    }

    /// Set the status.
    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the parent task.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<TaskId>) -> Self {
        self.parent_task_id = Some(parent.into());
        self
    }

    /// Set estimated and logged hours.
    #[must_use]
    pub fn with_hours(mut self, estimated: f64, logged: f64) -> Self {
        self.estimated_hours = Some(estimated);
        self.logged_hours = Some(logged);
        self
    }
}

/// A directed edge: `dependent_task_id` waits on `blocking_task_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependency {
    /// Edge id.
    pub id: DependencyId,
    /// The task that is waiting.
    pub dependent_task_id: TaskId,
    /// The task that must resolve first.
    pub blocking_task_id: TaskId,
    /// Kind of edge.
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

impl TaskDependency {
    /// Create a new edge stamped with the current time and a fresh id.
    #[must_use]
    pub fn new(dependent: TaskId, blocking: TaskId, dependency_type: DependencyType) -> Self {
        Self {
            id: DependencyId::generate(),
            dependent_task_id: dependent,
            blocking_task_id: blocking,
            dependency_type,
            created_at: Utc::now(),
        }
    }

    /// Whether this edge is the `(dependent, blocking, type)` triple.
    #[must_use]
    pub fn is_triple(
        &self,
        dependent: &TaskId,
        blocking: &TaskId,
        dependency_type: DependencyType,
    ) -> bool {
        self.dependent_task_id == *dependent
            && self.blocking_task_id == *blocking
            && self.dependency_type == dependency_type
    }
}
