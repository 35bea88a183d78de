//! trellis command-line interface.
//!
//! The binary in `main.rs` is a thin wrapper: argument parsing lives in
//! [`cli`], command execution in [`commands`] and logging setup in
//! [`tracing`].

pub mod cli;
pub mod commands;
pub mod tracing;
