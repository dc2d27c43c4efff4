//! CLI, configuration, clipboard publishing
//!
//! This crate provides the `getcal` command-line interface.

pub mod cli;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
