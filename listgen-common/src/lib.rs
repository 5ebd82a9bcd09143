//! # listgen common library
//!
//! Shared code for the listing-template services:
//! - Error type and `Result` alias
//! - TOML configuration loading and config-path resolution
//! - Logging initialisation
//! - SQLite pool opening

pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
