// server/src/cli/mod.rs

// Command-line interface for the medbook server: argument parsing and
// the serve loop.

pub mod cli;

pub use cli::{start_cli, CliArgs, Commands};
