//! Worker configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via FSMREG_CONFIG or --config)
//! 3. Environment variables

use fsmreg_core::{Definition, DefinitionParts};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Worker process configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Driver configuration.
    pub worker: WorkerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Automatons to drive.
    pub machines: Vec<MachineConfig>,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("FSMREG_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file, then applies environment
    /// variable overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::ParseError(_, msg) => ConfigError::ParseError(path.to_path_buf(), msg),
            other => other,
        })
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ParseError(PathBuf::from("<inline>"), e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        self.worker.apply_env_overrides();
        self.storage.apply_env_overrides();
    }

    /// Checks the worker settings and every machine definition.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.threads == 0 {
            return Err(ConfigError::ValidationError(
                "worker.threads must be at least 1".to_string(),
            ));
        }
        if self.machines.is_empty() {
            return Err(ConfigError::ValidationError(
                "no machines configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for machine in &self.machines {
            if !names.insert(machine.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate machine name '{}'",
                    machine.name
                )));
            }
            machine.initial_state()?;
        }

        Ok(())
    }
}

/// Driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of driver threads.
    pub threads: usize,
    /// Symbols applied to each machine per run.
    pub iterations: u64,
    /// Snapshot each machine after this many symbols (0 = only at the end).
    pub snapshot_every: u64,
    /// Seed of the symbol stream.
    pub seed: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            iterations: 10_000,
            snapshot_every: 1_000,
            seed: 0,
        }
    }
}

impl WorkerConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(threads) = std::env::var("FSMREG_THREADS") {
            if let Ok(n) = threads.parse() {
                self.threads = n;
            }
        }

        if let Ok(iterations) = std::env::var("FSMREG_ITERATIONS") {
            if let Ok(n) = iterations.parse() {
                self.iterations = n;
            }
        }

        if let Ok(every) = std::env::var("FSMREG_SNAPSHOT_EVERY") {
            if let Ok(n) = every.parse() {
                self.snapshot_every = n;
            }
        }

        if let Ok(seed) = std::env::var("FSMREG_SEED") {
            if let Ok(n) = seed.parse() {
                self.seed = n;
            }
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl StorageConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("FSMREG_DATA") {
            self.data_dir = PathBuf::from(dir);
        }
    }

    /// Returns the snapshots directory path.
    pub fn snapshots_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }
}

/// A named automaton to drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Name, also used as the snapshot name.
    pub name: String,

    #[serde(flatten)]
    pub definition: DefinitionParts,

    /// Label of the initial state (defaults to the first state).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,
}

impl MachineConfig {
    /// Validates the definition and resolves the initial state index.
    pub fn initial_state(&self) -> Result<usize, ConfigError> {
        let definition = Definition::from_parts(self.definition.clone()).map_err(|e| {
            ConfigError::ValidationError(format!("machine '{}': {}", self.name, e))
        })?;

        match &self.initial {
            None => Ok(0),
            Some(label) => definition.state_index(label).ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "machine '{}': initial state '{}' not in states list",
                    self.name, label
                ))
            }),
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .0.display(), .1)]
    IoError(PathBuf, std::io::Error),

    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    ParseError(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}
