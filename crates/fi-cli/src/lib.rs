//! Focus tracker CLI library.
//!
//! This crate provides the CLI interface for the focus tracker.

mod cli;
pub mod commands;
mod config;
#[cfg(feature = "input-hooks")]
pub mod hooks;
pub mod lock;
pub mod platform;

pub use cli::{Cli, Commands};
pub use config::Config;
