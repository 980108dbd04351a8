// src/config/config.rs
use crate::{
    coordinator::CoordinatorConfig, network::client::WorkerConfig, utils::error::MinerError,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Main configuration structure for the swarm application
///
/// Contains the settings of both roles. Every field has a default, so a
/// file only needs the values it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Coordinator settings, including the work service
    pub coordinator: CoordinatorConfig,

    /// Worker settings
    pub worker: WorkerConfig,
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(MinerError)` - If file couldn't be read, parsed or validated
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::Config(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&config_str)
    }

    /// Parses and validates configuration text
    pub fn parse(text: &str) -> Result<Self, MinerError> {
        let config: Config = toml::from_str(text)
            .map_err(|e| MinerError::Config(format!("Invalid config format: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot check
    pub fn validate(&self) -> Result<(), MinerError> {
        let oracle = &self.coordinator.oracle;
        for (name, value) in [("work_url", &oracle.work_url), ("validate_url", &oracle.validate_url)] {
            Url::parse(value)
                .map_err(|e| MinerError::Config(format!("Invalid {} '{}': {}", name, value, e)))?;
        }
        if oracle.validate_attempts == 0 {
            return Err(MinerError::Config("validate_attempts must be at least 1".into()));
        }
        if self.worker.batch_size == 0 {
            return Err(MinerError::Config("batch_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Generates a configuration template string
    ///
    /// # Arguments
    /// * `coordinator` - Include the coordinator section
    /// * `worker` - Include the worker section
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template(coordinator: bool, worker: bool) -> String {
        let mut template = String::new();
        template.push_str("# hashswarm-rs configuration\n");

        if coordinator {
            template.push_str("\n[coordinator]\n");
            template.push_str("# Address workers connect to\n");
            template.push_str("bind = \"0.0.0.0:1337\"\n");
            template.push_str("# Shared secret workers must present\n");
            template.push_str("secret = \"password\"\n");
            template.push_str("handshake_timeout_ms = 10000\n");
            template.push_str("# How long PROGRESS waits before reporting a worker unreachable\n");
            template.push_str("progress_timeout_ms = 2000\n");
            template.push_str("\n# Work generation / validation service\n");
            template.push_str("[coordinator.oracle]\n");
            template.push_str("work_url = \"http://127.0.0.1:8080/generate_work\"\n");
            template.push_str("validate_url = \"http://127.0.0.1:8080/validate_work\"\n");
            template.push_str("# token = \"optional bearer token\"\n");
            template.push_str("timeout_ms = 10000\n");
            template.push_str("# Attempts before a candidate is reported indeterminate\n");
            template.push_str("validate_attempts = 3\n");
        }

        if worker {
            template.push_str("\n[worker]\n");
            template.push_str("coordinator = \"127.0.0.1:1337\"\n");
            template.push_str("secret = \"password\"\n");
            template.push_str("# Hasher threads (0 = auto-detect)\n");
            template.push_str("threads = 0\n");
            template.push_str("# Nonces hashed between two cancellation checks\n");
            template.push_str("batch_size = 256\n");
            template.push_str("report_interval_secs = 60\n");
        }

        template
    }
}
