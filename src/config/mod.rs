// src/config/mod.rs
//! Configuration management for the swarm
//!
//! This module handles all configuration-related functionality including:
//! - Loading and parsing configuration files
//! - Validating endpoint URLs and numeric limits
//! - Generating configuration templates
//!
//! The configuration uses TOML format with a `[coordinator]` section (plus
//! `[coordinator.oracle]`) and a `[worker]` section.

/// Core configuration implementation
///
/// Contains the [`Config`] struct bundling the coordinator and worker
/// settings.
pub mod config;

// Re-export key items for easy access
pub use config::Config;

use crate::utils::error::MinerError;
use std::path::PathBuf;

/// Loads configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the configuration file (anything convertible to PathBuf)
///
/// # Returns
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(MinerError)` - If the file couldn't be read, parsed or validated
pub fn load(path: impl Into<PathBuf>) -> Result<Config, MinerError> {
    Config::load(path)
}

/// Loads `path` if given, defaults otherwise
pub fn load_or_default(path: Option<PathBuf>) -> Result<Config, MinerError> {
    match path {
        Some(path) => load(path),
        None => Ok(Config::default()),
    }
}

/// Generates a commented configuration template
///
/// # Arguments
/// * `coordinator` - Whether to include the coordinator section
/// * `worker` - Whether to include the worker section
///
/// # Returns
/// String containing a ready-to-use TOML configuration template
pub fn generate_template(coordinator: bool, worker: bool) -> String {
    Config::generate_template(coordinator, worker)
}
