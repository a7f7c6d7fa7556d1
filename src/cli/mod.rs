//! Command-line interface for the warehouse pipeline
//!
//! The `songplay-etl` binary parses arguments and dispatches to the
//! handlers in [`commands`].

pub mod commands;
pub mod error;

pub use error::CliError;
