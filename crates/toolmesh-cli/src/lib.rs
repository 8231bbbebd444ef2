//! Toolmesh command-line interface
//!
//! Runs the built-in tool providers (`serve-stdio`, `serve-http`) and drives a
//! coordinator from an agent config file (`discover`, `call`, `status`).

pub mod cli;
pub mod commands;
pub mod error;
pub mod utils;

pub use error::{CliError, CliResult};
