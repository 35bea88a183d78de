//! `trellis check`: integrity report over the whole store.

use super::{Output, Workspace};
use crate::cli::CliError;
use crate::command_span;
use serde::Serialize;
use tracing::warn;
use trellis_core::{IntegrityReport, TaskId};

/// Integrity report plus hierarchy findings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    /// Dependency findings.
    #[serde(flatten)]
    pub dependencies: IntegrityReport,
    /// Tasks whose parent chain loops or is corrupt.
    pub hierarchy_errors: Vec<HierarchyError>,
    /// Deepest task depth in the store.
    pub max_depth_seen: usize,
}

/// A task whose ancestry could not be walked.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyError {
    /// The task.
    pub task_id: TaskId,
    /// What went wrong.
    pub message: String,
}

/// Check dependencies and the parent hierarchy of every task.
///
/// # Errors
///
/// Returns an error if a store fails. Findings are reported, not returned
/// as errors.
pub fn run(workspace: &Workspace) -> Result<Output, CliError> {
    let _span = command_span!("check").entered();
    let service = workspace.service();
    let dependencies = service.check_dependencies()?;

    let mut hierarchy_errors = Vec::new();
    let mut max_depth_seen = 0;
    for task in workspace.store().snapshot().tasks {
        match service.get_task_depth(&task.id) {
            Ok(depth) => max_depth_seen = max_depth_seen.max(depth),
            Err(err) => {
                warn!(task = %task.id, error = %err, "Corrupt task hierarchy");
                hierarchy_errors.push(HierarchyError {
                    task_id: task.id,
                    message: err.to_string(),
                });
            }
        }
    }

    let report = CheckReport {
        dependencies,
        hierarchy_errors,
        max_depth_seen,
    };

    let mut lines = vec![format!(
        "{} dependencies checked, deepest task at depth {}",
        report.dependencies.dependency_count, report.max_depth_seen
    )];
    for cycle in &report.dependencies.cycles {
        let chain: Vec<&str> = cycle.iter().map(TaskId::as_str).collect();
        lines.push(format!("cycle: {}", chain.join(" -> ")));
    }
    for id in &report.dependencies.dangling {
        lines.push(format!("dangling: {id}"));
    }
    for id in &report.dependencies.self_dependencies {
        lines.push(format!("self-dependency: {id}"));
    }
    for id in &report.dependencies.duplicates {
        lines.push(format!("duplicate: {id}"));
    }
    for error in &report.hierarchy_errors {
        lines.push(format!("hierarchy: {}: {}", error.task_id, error.message));
    }
    let ok = report.dependencies.is_valid && report.hierarchy_errors.is_empty();
    lines.push(if ok { "OK".to_string() } else { "PROBLEMS FOUND".to_string() });

    Output::new(&report, lines.join("\n"))
}
