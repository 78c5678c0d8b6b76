//! Time log CLI library.
//!
//! This crate provides the CLI interface and the batch pipeline driver.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
