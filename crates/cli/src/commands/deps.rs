//! `trellis deps` subcommands.

use super::{Output, Workspace, lines_or};
use crate::cli::CliError;
use crate::command_span;
use trellis_core::{
    DependencyFilter, DependencyId, DependencyType, Direction, ProjectId, TaskDependency, TaskId,
};

pub(crate) fn describe(dependency: &TaskDependency) -> String {
    format!(
        "{}  {} {} {}",
        dependency.id,
        dependency.dependent_task_id,
        dependency.dependency_type,
        dependency.blocking_task_id
    )
}

/// Create a dependency.
///
/// # Errors
///
/// Returns the service's rejection.
pub fn add(
    workspace: &Workspace,
    dependent: &TaskId,
    blocking: &TaskId,
    dependency_type: DependencyType,
) -> Result<Output, CliError> {
    let _span = command_span!("deps add").entered();
    let created = workspace
        .service()
        .create_dependency(dependent, blocking, dependency_type)?;
    let text = format!("Created dependency {}", describe(&created));
    Output::new(&created, text)
}

/// Delete a dependency by id.
///
/// # Errors
///
/// Returns a not-found error if no dependency has this id.
pub fn remove(workspace: &Workspace, id: &DependencyId) -> Result<Output, CliError> {
    let _span = command_span!("deps rm").entered();
    if !workspace.service().delete_dependency(id)? {
        return Err(trellis_core::Error::dependency_not_found(id).into());
    }
    Output::new(
        &serde_json::json!({ "deleted": id }),
        format!("Deleted dependency {id}"),
    )
}

/// List dependencies matching the given criteria.
///
/// # Errors
///
/// Returns an error if the filter is invalid or the store fails.
pub fn list(
    workspace: &Workspace,
    task: Option<&TaskId>,
    direction: Direction,
    dependency_type: Option<DependencyType>,
    project: Option<&ProjectId>,
    blocking_only: bool,
) -> Result<Output, CliError> {
    let _span = command_span!("deps list").entered();
    let mut filter = DependencyFilter::new();
    if let Some(task) = task {
        filter = filter.for_task(task.clone(), direction);
    }
    if let Some(dependency_type) = dependency_type {
        filter = filter.of_type(dependency_type);
    }
    if let Some(project) = project {
        filter = filter.in_project(project.clone());
    }
    if blocking_only {
        filter = filter.blocking();
    }

    let dependencies = workspace.service().list_dependencies(&filter)?;
    let text = lines_or(
        dependencies.iter().map(describe).collect(),
        "No dependencies",
    );
    Output::new(&dependencies, text)
}
