//! Tooling & Integration Layer
//!
//! Command-line access to a data directory.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
