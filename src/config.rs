//! Configuration management for the fraud simulator

use crate::types::score::RiskLevelThresholds;
use anyhow::{ensure, Context, Result};
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pre-trained classifier artifacts
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// Classifier exported to ONNX
    pub model_path: String,
    /// Feature schema JSON (ordered feature names and category codes)
    pub schema_path: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Synthetic transaction generation
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    /// Share of transactions drawn from the fraud regime
    #[serde(default = "default_fraud_rate")]
    pub fraud_rate: f64,
    /// Seed for reproducible runs; OS entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_fraud_rate() -> f64 {
    0.1
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            fraud_rate: default_fraud_rate(),
            seed: None,
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionConfig {
    /// Risk level classification thresholds
    #[serde(default)]
    pub risk_levels: RiskLevelThresholds,
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
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        Self::finish(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?;

        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self> {
        let app: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.validate()?;
        Ok(app)
    }

    /// Check value ranges serde cannot express
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.generator.fraud_rate),
            "generator.fraud_rate must be within [0, 1], got {}",
            self.generator.fraud_rate
        );
        let levels = &self.detection.risk_levels;
        ensure!(
            0.0 <= levels.medium && levels.medium <= levels.high && levels.high <= 1.0,
            "detection.risk_levels must satisfy 0 <= medium <= high <= 1, got medium={} high={}",
            levels.medium,
            levels.high
        );
        ensure!(self.artifacts.onnx_threads > 0, "artifacts.onnx_threads must be positive");
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            artifacts: ArtifactsConfig {
                model_path: "models/xgb_fraud.onnx".to_string(),
                schema_path: "models/feature_schema.json".to_string(),
                onnx_threads: 1,
            },
            generator: GeneratorConfig::default(),
            detection: DetectionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
