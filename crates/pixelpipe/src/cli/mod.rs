//! Subcommand implementations.

pub mod blend;
pub mod config;
pub mod modes;
pub mod render;
pub mod runner;
pub mod serve;
