//! Command execution for the trellis CLI.
//!
//! Every command runs against a [`Workspace`]: the configuration plus an
//! [`InMemoryStore`] loaded from the JSON snapshot. Mutating commands write
//! the snapshot back once they succeed.

pub mod bulk;
pub mod check;
pub mod deps;
pub mod hierarchy;
pub mod views;

use crate::cli::{CliError, Commands, DepsCommands, OkEnvelope};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use trellis_core::{InMemoryStore, TaskGraphService, TrellisConfig};

/// Service type every command works against.
pub type Service = TaskGraphService<InMemoryStore, InMemoryStore>;

/// Loaded configuration and store for one invocation.
pub struct Workspace {
    store_path: PathBuf,
    store: Arc<InMemoryStore>,
    service: Service,
}

impl Workspace {
    /// Load the configuration and the store snapshot.
    ///
    /// A missing snapshot file starts an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or an existing snapshot cannot
    /// be read or parsed.
    pub fn open(store_path: &Path, config_path: Option<&Path>) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => TrellisConfig::load(path)?,
            None => TrellisConfig::default(),
        };

        let store = if store_path.exists() {
            InMemoryStore::load(store_path)?
        } else {
            debug!(path = %store_path.display(), "No store snapshot, starting empty");
            InMemoryStore::new()
        };
        let store = Arc::new(store);
        let service = TaskGraphService::new(Arc::clone(&store), Arc::clone(&store), config);

        Ok(Self {
            store_path: store_path.to_path_buf(),
            store,
            service,
        })
    }

    /// The service over the loaded store.
    #[must_use]
    pub const fn service(&self) -> &Service {
        &self.service
    }

    /// The loaded store.
    #[must_use]
    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Write the store back to its snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn persist(&self) -> Result<(), CliError> {
        self.store.save(&self.store_path)?;
        info!(path = %self.store_path.display(), "Store snapshot written");
        Ok(())
    }
}

/// Output of a command: a JSON payload plus its text rendering.
pub struct Output {
    data: serde_json::Value,
    text: String,
}

impl Output {
    /// Build an output from a serializable payload and its text form.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the payload cannot be serialized.
    pub fn new<T: Serialize>(data: &T, text: impl Into<String>) -> Result<Self, CliError> {
        let data = serde_json::to_value(data).map_err(|e| CliError::Internal {
            tag: "internal",
            message: format!("Failed to serialize command output: {e}"),
            help: None,
        })?;
        Ok(Self {
            data,
            text: text.into(),
        })
    }

    /// Render the output for stdout.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the JSON envelope cannot be serialized.
    pub fn render(&self, json: bool) -> Result<String, CliError> {
        if json {
            serde_json::to_string_pretty(&OkEnvelope::new(&self.data)).map_err(|e| {
                CliError::Internal {
                    tag: "internal",
                    message: format!("Failed to serialize JSON envelope: {e}"),
                    help: None,
                }
            })
        } else {
            Ok(self.text.clone())
        }
    }
}

/// Run a parsed command against the workspace.
///
/// # Errors
///
/// Returns the command's error; the store is not written in that case.
pub fn execute(command: &Commands, workspace: &Workspace) -> Result<Output, CliError> {
    let output = match command {
        Commands::Deps { subcommand } => match subcommand {
            DepsCommands::Add {
                dependent,
                blocking,
                dependency_type,
            } => deps::add(workspace, dependent, blocking, *dependency_type),
            DepsCommands::Rm { id } => deps::remove(workspace, id),
            DepsCommands::List {
                task,
                direction,
                dependency_type,
                project,
                blocking,
            } => deps::list(
                workspace,
                task.as_ref(),
                (*direction).into(),
                *dependency_type,
                project.as_ref(),
                *blocking,
            ),
        },
        Commands::Blocking { task } => views::blocking(workspace, task),
        Commands::Graph { project } => views::graph(workspace, project),
        Commands::Impact { task } => views::impact(workspace, task),
        Commands::Tree { task, depth } => hierarchy::tree(workspace, task, *depth),
        Commands::Move {
            task,
            parent,
            position,
        } => hierarchy::move_task(workspace, task, parent.as_ref(), *position),
        Commands::Summary { task, recursive } => hierarchy::summary(workspace, task, *recursive),
        Commands::Bulk { file } => bulk::apply(workspace, file),
        Commands::Check => check::run(workspace),
    }?;

    if command.mutates() {
        workspace.persist()?;
    }
    Ok(output)
}

/// Join rendered lines, or return `empty` when there are none.
pub(crate) fn lines_or(lines: Vec<String>, empty: &str) -> String {
    if lines.is_empty() {
        empty.to_string()
    } else {
        lines.join("\n")
    }
}
