//! Read-only dependency views: blocking info, project graph, impact.

use super::{Output, Workspace, lines_or};
use crate::cli::CliError;
use crate::command_span;
use std::fmt::Write as _;
use trellis_core::{BlockingTask, ProjectId, TaskId};

fn describe_blocking(entry: &BlockingTask) -> String {
    let mark = if entry.resolved { "x" } else { " " };
    let status = entry
        .status
        .map_or_else(|| "MISSING".to_string(), |status| status.to_string());
    format!(
        "  [{mark}] {} {} ({status})",
        entry.key.as_deref().unwrap_or(entry.task_id.as_str()),
        entry.title.as_deref().unwrap_or_default()
    )
}

/// Show what blocks a task and what it blocks.
///
/// # Errors
///
/// Returns a not-found error if the task does not exist.
pub fn blocking(workspace: &Workspace, task: &TaskId) -> Result<Output, CliError> {
    let _span = command_span!("blocking").entered();
    let info = workspace.service().get_task_blocking_info(task)?;

    let mut text = format!(
        "{task}: {}\n",
        if info.can_start { "can start" } else { "blocked" }
    );
    let _ = writeln!(text, "Blocked by:");
    let _ = writeln!(
        text,
        "{}",
        lines_or(info.blocked_by.iter().map(describe_blocking).collect(), "  none")
    );
    let _ = writeln!(text, "Blocking:");
    let _ = write!(
        text,
        "{}",
        lines_or(info.blocking.iter().map(describe_blocking).collect(), "  none")
    );
    Output::new(&info, text)
}

/// Show the dependency graph of a project, grouped by level.
///
/// # Errors
///
/// Returns an error if a store fails.
pub fn graph(workspace: &Workspace, project: &ProjectId) -> Result<Output, CliError> {
    let _span = command_span!("graph").entered();
    let graph = workspace.service().generate_dependency_graph(project)?;

    let mut lines = Vec::new();
    for node in &graph.nodes {
        lines.push(format!(
            "L{} {} {} [{}]",
            node.level, node.key, node.title, node.status
        ));
    }
    for edge in &graph.edges {
        lines.push(format!(
            "{} {} {}",
            edge.dependent_task_id, edge.dependency_type, edge.blocking_task_id
        ));
    }
    for cycle in &graph.cycles {
        let chain: Vec<&str> = cycle.iter().map(TaskId::as_str).collect();
        lines.push(format!("cycle: {}", chain.join(" -> ")));
    }
    let text = lines_or(lines, &format!("Project {project} has no tasks"));
    Output::new(&graph, text)
}

/// Show every task that transitively waits on a task.
///
/// # Errors
///
/// Returns a not-found error if the task does not exist.
pub fn impact(workspace: &Workspace, task: &TaskId) -> Result<Output, CliError> {
    let _span = command_span!("impact").entered();
    let analysis = workspace.service().get_dependency_impact_analysis(task)?;

    let mut text = format!("{} task(s) impacted by {task}", analysis.total_impacted);
    if analysis.truncated {
        text.push_str(" (truncated)");
    }
    for impacted in &analysis.impacted {
        let _ = write!(
            text,
            "\n  {:?} d={} {}",
            impacted.impact,
            impacted.distance,
            impacted.key.as_deref().unwrap_or(impacted.task_id.as_str())
        );
    }
    let chain: Vec<&str> = analysis.critical_path.iter().map(TaskId::as_str).collect();
    let _ = write!(text, "\nCritical path: {}", chain.join(" -> "));
    Output::new(&analysis, text)
}
