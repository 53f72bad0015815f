//! Configuration management for the prediction engine

use crate::models::forest::ForestParams;
use crate::schema::Disease;
use crate::training::dataset::DatasetSpec;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Prefix for environment overrides, e.g. `DISEASE_RISK__PIPELINE__WORKERS=8`
const ENV_PREFIX: &str = "DISEASE_RISK";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding `<disease>.bundle.json` files
    pub artifacts_dir: PathBuf,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("models"),
        }
    }
}

/// Training configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    #[serde(default)]
    pub forest: ForestParams,
    /// Commit single-class models (flagged degenerate) instead of failing
    #[serde(default)]
    pub allow_degenerate: bool,
    /// Dataset per classifier disease
    #[serde(default = "default_datasets")]
    pub datasets: BTreeMap<Disease, DatasetSpec>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            forest: ForestParams::default(),
            allow_degenerate: false,
            datasets: default_datasets(),
        }
    }
}

fn default_datasets() -> BTreeMap<Disease, DatasetSpec> {
    Disease::ALL
        .iter()
        .filter_map(|&d| DatasetSpec::default_for(d).map(|spec| (d, spec)))
        .collect()
}

/// Batch scoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent scoring tasks
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path plus environment overrides.
    /// A missing file falls back to built-in defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.pipeline.workers > 0, "pipeline.workers must be at least 1");
        anyhow::ensure!(self.training.forest.n_trees > 0, "training.forest.n_trees must be at least 1");
        for disease in self.training.datasets.keys() {
            anyhow::ensure!(
                DatasetSpec::default_for(*disease).is_some(),
                "training.datasets.{} configured, but {} is evaluated by rules",
                disease,
                disease
            );
        }
        Ok(())
    }
}
