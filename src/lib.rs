//! sqlharvest - batch SQL extraction to spreadsheets.
//!
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod jobs;
pub mod logging;
pub mod tui;
