//! Command-line front end.
//!
//! Provides argument parsing and the command runners used by `main.rs`.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
