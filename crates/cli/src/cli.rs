use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand, ValueEnum};
use miette::{Diagnostic, Report};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;
use trellis_core::{DependencyId, DependencyType, Direction, ProjectId, TaskId};

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI, configuration or rejected-request error exit code
pub const EXIT_CLI: i32 = 2;
/// Referenced task or dependency does not exist
pub const EXIT_NOT_FOUND: i32 = 3;
/// Authorization or internal failure exit code
pub const EXIT_INTERNAL: i32 = 4;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(trellis::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// The request broke a graph or hierarchy rule (exit code 2)
    #[error("{message}")]
    #[diagnostic(code(trellis::cli::rejected))]
    Rejected {
        /// Stable tag, e.g. `circular`
        tag: &'static str,
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Referenced record does not exist (exit code 3)
    #[error("{message}")]
    #[diagnostic(code(trellis::cli::not_found))]
    NotFound {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Authorization, store or I/O failure (exit code 4)
    #[error("{message}")]
    #[diagnostic(code(trellis::cli::internal))]
    Internal {
        /// Stable tag, e.g. `io`
        tag: &'static str,
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Stable tag used in JSON error envelopes.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Rejected { tag, .. } | Self::Internal { tag, .. } => tag,
            Self::NotFound { .. } => "not-found",
        }
    }
}

/// Convert `trellis_core::Error` to the matching `CliError` variant.
///
/// - Configuration errors -> Config (exit code 2)
/// - Validation and conflict errors -> Rejected (exit code 2)
/// - Missing tasks and dependencies -> `NotFound` (exit code 3)
/// - Authorization, internal and I/O errors -> Internal (exit code 4)
impl From<trellis_core::Error> for CliError {
    fn from(err: trellis_core::Error) -> Self {
        let tag = err.tag();
        match err {
            // Extract the message to avoid "Configuration error: Configuration error:"
            trellis_core::Error::Configuration { message } => {
                Self::config_with_help(message, "Check the --config file and the --store snapshot")
            }
            trellis_core::Error::Validation { kind, message, .. } => Self::Rejected {
                tag,
                message,
                help: match kind {
                    trellis_core::ValidationKind::Circular => Some(
                        "Remove one of the dependencies on the reported path first".to_string(),
                    ),
                    trellis_core::ValidationKind::MaxDepthExceeded => Some(
                        "Raise hierarchy.maxDepth or move the task higher up".to_string(),
                    ),
                    _ => None,
                },
            },
            trellis_core::Error::Conflict { message } => Self::Rejected {
                tag,
                message,
                help: Some("Use `trellis deps list` to find the existing dependency".to_string()),
            },
            trellis_core::Error::NotFound { .. } => Self::NotFound {
                message: err.to_string(),
                help: None,
            },
            trellis_core::Error::Io { ref source, .. } => Self::Internal {
                tag,
                message: format!("{err}: {source}"),
                help: Some("Check file permissions and ensure the path exists".to_string()),
            },
            trellis_core::Error::Authorization { .. } | trellis_core::Error::Internal { .. } => {
                Self::Internal {
                    tag,
                    message: err.to_string(),
                    help: None,
                }
            }
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } | CliError::Rejected { .. } => EXIT_CLI,
        CliError::NotFound { .. } => EXIT_NOT_FOUND,
        CliError::Internal { .. } => EXIT_INTERNAL,
    }
}

/// Render error appropriately based on JSON flag
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": err.tag(),
            "message": err.to_string()
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Which side of a dependency a listed task sits on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Default)]
pub enum DirectionArg {
    /// The task is the dependent
    Incoming,
    /// The task is the blocker
    Outgoing,
    /// Either side
    #[default]
    Both,
}

impl From<DirectionArg> for Direction {
    fn from(direction: DirectionArg) -> Self {
        match direction {
            DirectionArg::Incoming => Self::Incoming,
            DirectionArg::Outgoing => Self::Outgoing,
            DirectionArg::Both => Self::Both,
        }
    }
}

/// Task dependency management from the command line.
///
/// Reads tasks and dependencies from a JSON snapshot, applies the
/// dependency, hierarchy and roll-up rules, and writes mutations back.
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(about = "Task dependency graphs, hierarchies and roll-ups")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// JSON store snapshot.
    #[arg(
        long,
        short = 's',
        global = true,
        env = "TRELLIS_STORE",
        default_value = "trellis.json",
        help = "JSON snapshot holding tasks and dependencies"
    )]
    pub store: PathBuf,

    /// TOML configuration file.
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "TRELLIS_CONFIG",
        help = "TOML configuration file"
    )]
    pub config: Option<PathBuf>,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Log output format.
    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    /// Emit JSON envelope.
    #[arg(long, global = true, help = "Emit JSON envelope instead of text")]
    pub json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dependency operations.
    #[command(about = "Create, delete and list dependencies")]
    Deps {
        /// Dependency subcommand to execute.
        #[command(subcommand)]
        subcommand: DepsCommands,
    },
    /// Show what blocks a task and what it blocks.
    #[command(about = "Show what blocks a task and what it blocks")]
    Blocking {
        /// The task.
        task: TaskId,
    },
    /// Show the dependency graph of a project.
    #[command(about = "Show the dependency graph of a project")]
    Graph {
        /// The project.
        project: ProjectId,
    },
    /// Show every task that transitively waits on a task.
    #[command(about = "Show every task that transitively waits on a task")]
    Impact {
        /// The task.
        task: TaskId,
    },
    /// Show the subtask tree of a task.
    #[command(about = "Show the subtask tree of a task")]
    Tree {
        /// Root of the tree.
        task: TaskId,
        /// Levels to expand below the root.
        #[arg(long, short = 'd', help = "Levels to expand below the root")]
        depth: Option<usize>,
    },
    /// Move a task under a new parent.
    #[command(about = "Move a task under a new parent, or to the top level")]
    Move {
        /// The task to move.
        task: TaskId,
        /// New parent; omit to make the task top-level.
        #[arg(long, short = 'p', help = "New parent; omit to make the task top-level")]
        parent: Option<TaskId>,
        /// Ordinal among the new siblings.
        #[arg(long, help = "Ordinal among the new siblings")]
        position: Option<u32>,
    },
    /// Roll up the subtasks of a task.
    #[command(about = "Roll up subtask progress and hours")]
    Summary {
        /// The parent task.
        task: TaskId,
        /// Include every descendant, not only direct children.
        #[arg(long, short = 'r', help = "Include every descendant, not only direct children")]
        recursive: bool,
    },
    /// Apply a bulk request read from a JSON file.
    #[command(about = "Apply a bulk dependency request read from a JSON file")]
    Bulk {
        /// Path to the request, `-` for stdin.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Check the store for cycles and dangling references.
    #[command(about = "Check the store for cycles, dangling references and hierarchy loops")]
    Check,
}

/// Dependency subcommands.
#[derive(Subcommand, Debug)]
pub enum DepsCommands {
    /// Make a task wait on another.
    #[command(about = "Make DEPENDENT wait on BLOCKING")]
    Add {
        /// The waiting task.
        dependent: TaskId,
        /// The task waited on.
        blocking: TaskId,
        /// Dependency type.
        #[arg(
            long = "type",
            short = 't',
            default_value = "blocks",
            help = "blocks, relates-to, duplicates or clones"
        )]
        dependency_type: DependencyType,
    },
    /// Delete a dependency by id.
    #[command(about = "Delete a dependency by id")]
    Rm {
        /// The dependency id.
        id: DependencyId,
    },
    /// List dependencies.
    #[command(about = "List dependencies")]
    List {
        /// Only dependencies touching this task.
        #[arg(long, help = "Only dependencies touching this task")]
        task: Option<TaskId>,
        /// Side of the dependency the task sits on.
        #[arg(long, value_enum, default_value_t = DirectionArg::Both, requires = "task")]
        direction: DirectionArg,
        /// Only dependencies of this type.
        #[arg(long = "type", short = 't', help = "Only dependencies of this type")]
        dependency_type: Option<DependencyType>,
        /// Only dependencies inside this project.
        #[arg(long, help = "Only dependencies whose tasks both belong to this project")]
        project: Option<ProjectId>,
        /// Only blocking dependencies.
        #[arg(long, help = "Only blocking dependencies")]
        blocking: bool,
    },
}

impl Commands {
    /// Short name used in spans and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Deps { subcommand } => match subcommand {
                DepsCommands::Add { .. } => "deps add",
                DepsCommands::Rm { .. } => "deps rm",
                DepsCommands::List { .. } => "deps list",
            },
            Self::Blocking { .. } => "blocking",
            Self::Graph { .. } => "graph",
            Self::Impact { .. } => "impact",
            Self::Tree { .. } => "tree",
            Self::Move { .. } => "move",
            Self::Summary { .. } => "summary",
            Self::Bulk { .. } => "bulk",
            Self::Check => "check",
        }
    }

    /// Whether the command writes to the store.
    #[must_use]
    pub const fn mutates(&self) -> bool {
        matches!(
            self,
            Self::Deps {
                subcommand: DepsCommands::Add { .. } | DepsCommands::Rm { .. }
            } | Self::Move { .. }
                | Self::Bulk { .. }
        )
    }
}

/// Parse command line arguments
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::ValidationKind;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["trellis", "check"]).unwrap();

        assert_eq!(cli.level, LogLevel::Warn);
        assert_eq!(cli.log_format, TracingFormat::Compact);
        assert!(!cli.json);
        assert!(matches!(cli.command, Some(Commands::Check)));
    }

    #[test]
    fn test_deps_add_parses_type() {
        let cli = Cli::try_parse_from([
            "trellis", "--json", "deps", "add", "t2", "t1", "--type", "relates-to",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Some(Commands::Deps {
                subcommand:
                    DepsCommands::Add {
                        dependent,
                        blocking,
                        dependency_type,
                    },
            }) => {
                assert_eq!(dependent.as_str(), "t2");
                assert_eq!(blocking.as_str(), "t1");
                assert_eq!(dependency_type, DependencyType::RelatesTo);
            }
            other => panic!("Expected deps add, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_dependency_type_is_rejected() {
        assert!(Cli::try_parse_from(["trellis", "deps", "add", "a", "b", "--type", "owns"]).is_err());
    }

    #[test]
    fn test_direction_requires_task() {
        assert!(Cli::try_parse_from(["trellis", "deps", "list", "--direction", "incoming"]).is_err());
    }

    #[test]
    fn test_mutating_commands() {
        let cli = Cli::try_parse_from(["trellis", "move", "t1", "--parent", "t0"]).unwrap();
        assert!(cli.command.as_ref().is_some_and(Commands::mutates));

        let cli = Cli::try_parse_from(["trellis", "tree", "t1"]).unwrap();
        assert!(!cli.command.as_ref().is_some_and(Commands::mutates));
    }

    #[test]
    fn test_exit_codes() {
        let rejected: CliError =
            trellis_core::Error::validation(ValidationKind::Circular, "cycle").into();
        assert_eq!(exit_code_for(&rejected), EXIT_CLI);
        assert_eq!(rejected.tag(), "circular");

        let conflict: CliError = trellis_core::Error::conflict("exists").into();
        assert_eq!(exit_code_for(&conflict), EXIT_CLI);
        assert_eq!(conflict.tag(), "already-exists");

        let missing: CliError = trellis_core::Error::task_not_found("t9").into();
        assert_eq!(exit_code_for(&missing), EXIT_NOT_FOUND);

        let denied: CliError = trellis_core::Error::authorization("nope").into();
        assert_eq!(exit_code_for(&denied), EXIT_INTERNAL);

        let config: CliError = trellis_core::Error::configuration("bad").into();
        assert_eq!(exit_code_for(&config), EXIT_CLI);
        assert_eq!(config.tag(), "config");
    }
}
