use crate::distance::DistanceFunction;
use crate::eval::EvaluatorOptions;
use crate::features::DEFAULT_FEATURE_IDENTIFIER;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the current directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "mapeval.toml";

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "MAPEVAL_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mapeval: MapEvalConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

/// General settings
#[derive(Debug, Clone, Deserialize)]
pub struct MapEvalConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for MapEvalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Feature container settings
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    /// Name the matrix is stored under inside the container.
    #[serde(default = "default_identifier")]
    pub identifier: String,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            identifier: default_identifier(),
        }
    }
}

/// Evaluation settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default)]
    pub distance_function: DistanceFunction,
    #[serde(default)]
    pub top_k: usize,
    #[serde(default)]
    pub exclude_query_from_results: bool,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub collect_precision_recall: bool,
    /// Minimum acceptable mAP; 0 disables the check.
    #[serde(default)]
    pub min_map: f64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_identifier() -> String {
    DEFAULT_FEATURE_IDENTIFIER.to_string()
}

impl Config {
    /// Load configuration
    ///
    /// Loads environment variables from .env file (if present) first.
    /// Looks for a config file in this order:
    /// 1. `explicit` path (the `--config` flag)
    /// 2. Path specified in MAPEVAL_CONFIG environment variable
    /// 3. ./mapeval.toml in current directory
    ///
    /// Without any file the built-in defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // Optional file, errors ignored
        let _ = dotenv::dotenv();

        let config_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => match std::env::var(CONFIG_ENV) {
                Ok(path) => Some(PathBuf::from(path)),
                Err(_) => {
                    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                    default.exists().then_some(default)
                }
            },
        };

        let config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Parse a config file without the lookup rules of [`Config::load`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.features.identifier.trim().is_empty() {
            anyhow::bail!("features.identifier must not be empty");
        }

        if !(0.0..=1.0).contains(&self.evaluation.min_map) {
            anyhow::bail!("evaluation.min_map must be between 0.0 and 1.0");
        }

        if self.mapeval.log_level.trim().is_empty() {
            anyhow::bail!("mapeval.log_level must not be empty");
        }

        Ok(())
    }

    /// Evaluator options described by the `[evaluation]` section
    pub fn evaluator_options(&self) -> EvaluatorOptions {
        EvaluatorOptions {
            top_k: self.evaluation.top_k,
            exclude_query_from_db: self.evaluation.exclude_query_from_results,
            collect_precision_recall: self.evaluation.collect_precision_recall,
            parallel: self.evaluation.parallel,
        }
    }
}
