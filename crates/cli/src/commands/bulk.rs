//! `trellis bulk`: apply a batch read from a JSON file.

use super::{Output, Workspace};
use crate::cli::CliError;
use crate::command_span;
use std::io::Read;
use std::path::Path;
use trellis_core::BulkDependencyRequest;

fn read_request(file: &Path) -> Result<BulkDependencyRequest, CliError> {
    let content = if file == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| CliError::Internal {
                tag: "io",
                message: format!("Failed to read bulk request from stdin: {e}"),
                help: None,
            })?;
        buffer
    } else {
        std::fs::read_to_string(file).map_err(|e| CliError::Internal {
            tag: "io",
            message: format!("Failed to read {}: {e}", file.display()),
            help: Some("Check that the bulk request file exists".to_string()),
        })?
    };

    serde_json::from_str(&content).map_err(|e| CliError::Rejected {
        tag: "invalid-request",
        message: format!("Invalid bulk request: {e}"),
        help: Some(
            r#"Expected {"operation": "CREATE", "dependencies": [{"dependentTaskId": ..., "blockingTaskId": ...}]}"#
                .to_string(),
        ),
    })
}

/// Apply a bulk dependency request.
///
/// Entry failures are part of the output; only a malformed batch fails the
/// command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the batch is rejected as
/// a whole.
pub fn apply(workspace: &Workspace, file: &Path) -> Result<Output, CliError> {
    let _span = command_span!("bulk").entered();
    let request = read_request(file)?;
    let result = workspace.service().bulk_dependency_operation(&request)?;

    let mut lines = vec![format!("{}: {}", result.operation, result.summary())];
    for failure in &result.failed {
        lines.push(format!(
            "  #{} {} {} {}: {} [{}]",
            failure.index,
            failure.dependent_task_id,
            failure.dependency_type,
            failure.blocking_task_id,
            failure.error,
            failure.error_tag
        ));
    }
    for warning in &result.warnings {
        lines.push(format!("  warning: {warning}"));
    }
    Output::new(&result, lines.join("\n"))
}
