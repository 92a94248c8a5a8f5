//! Time-budget CLI library.
//!
//! This crate provides the CLI interface for the time-budget engine.

mod cli;
pub mod commands;
mod config;
pub mod input;

pub use cli::{Cli, Commands, SelectionArgs, WindowArgs};
pub use config::{Config, StoreBackend};
pub use input::Session;
