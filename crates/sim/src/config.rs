use std::{fs, path::PathBuf};

use common::prelude::CounterReset;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "ehr-sim";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// A clinician enrolled by the demo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicianProfile {
    pub name: String,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Attribute universe known to the policy authority
    #[serde(default = "default_attributes")]
    pub attributes: Vec<String>,
    /// Policy every uploaded record is bound to
    #[serde(default = "default_policy")]
    pub policy: String,
    /// Clinicians the demo runs access checks for
    #[serde(default = "default_clinicians")]
    pub clinicians: Vec<ClinicianProfile>,
    /// Number of synthetic records when no record file is given
    #[serde(default = "default_record_count")]
    pub record_count: usize,
    /// Seed for the synthetic record generator
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub counter_reset: CounterReset,
    /// JSON record file to load instead of synthesizing
    #[serde(default)]
    pub records_path: Option<PathBuf>,
}

fn default_attributes() -> Vec<String> {
    ["DOCTOR", "NURSE", "CARDIOLOGY", "ONCOLOGY", "ADMIN"]
        .iter()
        .map(|a| a.to_string())
        .collect()
}

fn default_policy() -> String {
    "DOCTOR AND CARDIOLOGY".to_string()
}

fn default_clinicians() -> Vec<ClinicianProfile> {
    vec![
        ClinicianProfile {
            name: "Dr. Alice".to_string(),
            attributes: vec!["DOCTOR".to_string(), "CARDIOLOGY".to_string()],
        },
        ClinicianProfile {
            name: "Nurse Bob".to_string(),
            attributes: vec!["NURSE".to_string(), "CARDIOLOGY".to_string()],
        },
        ClinicianProfile {
            name: "Dr. Carol".to_string(),
            attributes: vec!["DOCTOR".to_string(), "ONCOLOGY".to_string()],
        },
    ]
}

fn default_record_count() -> usize {
    20
}

fn default_seed() -> u64 {
    42
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            attributes: default_attributes(),
            policy: default_policy(),
            clinicians: default_clinicians(),
            record_count: default_record_count(),
            seed: default_seed(),
            counter_reset: CounterReset::default(),
            records_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimState {
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: SimConfig,
}

impl SimState {
    /// Get the config file path (custom or default ~/.ehr-sim/config.toml)
    pub fn config_path(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)).join(CONFIG_FILE_NAME))
    }

    /// Write a config file, refusing to overwrite unless `force` is set
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<SimConfig>,
        force: bool,
    ) -> Result<Self, StateError> {
        let config_path = Self::config_path(custom_path)?;
        if config_path.exists() && !force {
            return Err(StateError::AlreadyInitialized(config_path));
        }

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config = config.unwrap_or_default();
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load an existing config file
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let config_path = Self::config_path(custom_path)?;
        if !config_path.exists() {
            return Err(StateError::NotInitialized(config_path));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: SimConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load the config file, or fall back to defaults when none was written
    pub fn load_or_default(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        match Self::load(custom_path) {
            Err(StateError::NotInitialized(config_path)) => {
                tracing::info!(
                    "no config at {}, using defaults",
                    config_path.display()
                );
                Ok(Self {
                    config_path,
                    config: SimConfig::default(),
                })
            }
            other => other,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("no config at {0}. Run 'ehr-sim init' first")]
    NotInitialized(PathBuf),

    #[error("config already exists at {0}. Use --force to overwrite")]
    AlreadyInitialized(PathBuf),

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
