//! Command-line front end for MediAnalyze Pro.
//!
//! `main.rs` only parses arguments and dispatches; the commands live here so
//! integration tests can drive them against a temporary database.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod summary;
pub mod types;
