//! Hierarchy commands: tree, move and subtask summary.

use super::{Output, Workspace};
use crate::cli::CliError;
use crate::command_span;
use trellis_core::{SummaryScope, TaskId, TaskTreeNode};

fn render_tree(node: &TaskTreeNode, indent: usize, out: &mut Vec<String>) {
    let more = if node.has_children && node.children.is_empty() {
        " ..."
    } else {
        ""
    };
    out.push(format!(
        "{}{} {} [{}]{more}",
        "  ".repeat(indent),
        node.key,
        node.title,
        node.status
    ));
    for child in &node.children {
        render_tree(child, indent + 1, out);
    }
}

/// Show the subtask tree below a task.
///
/// # Errors
///
/// Returns a not-found error if the task does not exist.
pub fn tree(workspace: &Workspace, task: &TaskId, depth: Option<usize>) -> Result<Output, CliError> {
    let _span = command_span!("tree").entered();
    let root = workspace.service().get_task_tree(task, depth)?;

    let mut lines = Vec::new();
    render_tree(&root, 0, &mut lines);
    Output::new(&root, lines.join("\n"))
}

/// Move a task under a new parent, or to the top level.
///
/// # Errors
///
/// Returns the service's rejection, e.g. `circular-reference`.
pub fn move_task(
    workspace: &Workspace,
    task: &TaskId,
    parent: Option<&TaskId>,
    position: Option<u32>,
) -> Result<Output, CliError> {
    let _span = command_span!("move").entered();
    let moved = workspace.service().move_task(task, parent, position)?;

    let text = match &moved.parent_task_id {
        Some(parent) => format!("Moved {} under {parent}", moved.key),
        None => format!("Moved {} to the top level", moved.key),
    };
    Output::new(&moved, text)
}

/// Roll up the subtasks of a task.
///
/// # Errors
///
/// Returns a not-found error if the task does not exist.
pub fn summary(workspace: &Workspace, task: &TaskId, recursive: bool) -> Result<Output, CliError> {
    let _span = command_span!("summary").entered();
    let scope = if recursive {
        SummaryScope::Recursive
    } else {
        SummaryScope::Direct
    };
    let summary = workspace
        .service()
        .get_subtask_summary_with_scope(task, scope)?;

    let text = format!(
        "{} subtask(s): {} done, {} in progress, {} to do ({}%)\nHours: {} estimated, {} logged, {} remaining",
        summary.total_subtasks,
        summary.completed_subtasks,
        summary.in_progress_subtasks,
        summary.todo_subtasks,
        summary.completion_percentage,
        summary.estimated_hours,
        summary.logged_hours,
        summary.remaining_hours
    );
    Output::new(&summary, text)
}
