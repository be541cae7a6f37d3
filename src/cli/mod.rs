//! Command-line interface components
//!
//! Argument parsing, the command handler and the progress display of the
//! `condarepo` binary.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::Cli;
pub use commands::{apply_overrides, handle_mirror, write_report};
pub use progress::{ProgressDisplay, ProgressTally};
