//! Feeding reminder CLI library.
//!
//! This crate provides the `fw` command line interface and the terminal
//! host the reminder engine runs on.

mod cli;
pub mod commands;
mod config;
pub mod host;
pub mod session;

pub use cli::{BabyAction, Cli, Commands, SettingsAction, SettingsChanges};
pub use config::Config;
