//! trellis CLI entry point.

// CLI binary needs to output to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

use trellis::cli::{self, CliError, EXIT_OK, exit_code_for, render_error};
use trellis::commands::{self, Workspace};
use trellis::tracing::{TracingConfig, init_tracing};

fn main() {
    // Tracing may be unusable during a panic, so print directly.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let exit_code = run(cli::parse());
    std::process::exit(exit_code);
}

fn run(cli: cli::Cli) -> i32 {
    let tracing_config = TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
        ..Default::default()
    };
    if let Err(err) = init_tracing(tracing_config) {
        eprintln!("Failed to initialize logging: {err}");
    }

    let Some(command) = cli.command else {
        let err = CliError::config_with_help(
            "No subcommand provided",
            "Run 'trellis --help' for usage information",
        );
        render_error(&err, cli.json);
        return exit_code_for(&err);
    };

    let result = Workspace::open(&cli.store, cli.config.as_deref())
        .and_then(|workspace| commands::execute(&command, &workspace))
        .and_then(|output| output.render(cli.json));

    match result {
        Ok(rendered) => {
            println!("{rendered}");
            EXIT_OK
        }
        Err(err) => {
            tracing::debug!(command = command.name(), error = %err, "Command failed");
            render_error(&err, cli.json);
            exit_code_for(&err)
        }
    }
}
