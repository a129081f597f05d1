//! Command-line interface for etch-bench.
//!
//! Provides commands for starting benchmark runs, listing a host's models,
//! and managing saved hosts and run history.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
