//! Configuration for the stress classifier.

use crate::core::pipeline::PipelineSettings;
use crate::core::simulator::SimulationConfig;
use crate::long_term::AggregatorSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the trained model artifact
    pub model_path: PathBuf,

    /// Path of the pre-processed `.npz` dataset
    pub dataset_path: PathBuf,

    /// Windowing, resampling and tier settings
    pub pipeline: PipelineSettings,

    /// Synthetic session used when no recording is supplied
    pub simulation: SimulationConfig,

    /// Long-term trend analysis
    pub aggregator: AggregatorSettings,

    /// HTTP server
    pub server: ServerSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models").join("stress_model.json"),
            dataset_path: PathBuf::from("data").join("processed_wesad.npz"),
            pipeline: PipelineSettings::default(),
            simulation: SimulationConfig::default(),
            aggregator: AggregatorSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit file.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stress-classifier")
            .join("config.json")
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.target_rate_hz == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.target_rate_hz must be positive".to_string(),
            ));
        }
        if p.step_secs == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.step_secs must be positive".to_string(),
            ));
        }
        if p.step_secs > p.window_secs {
            return Err(ConfigError::Invalid(format!(
                "pipeline.step_secs ({}) exceeds pipeline.window_secs ({})",
                p.step_secs, p.window_secs
            )));
        }
        if !p.thresholds.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "pipeline.thresholds must satisfy 0 <= moderate_from <= high_above <= 100, got {} / {}",
                p.thresholds.moderate_from, p.thresholds.high_above
            )));
        }
        if p.max_recording_secs == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_recording_secs must be positive".to_string(),
            ));
        }
        if let Err(e) = p.input_rates.validate() {
            return Err(ConfigError::Invalid(format!("pipeline.input_rates: {}", e.message)));
        }
        if self.simulation.phases.is_empty() {
            return Err(ConfigError::Invalid(
                "simulation.phases must not be empty".to_string(),
            ));
        }
        let tolerance = self.aggregator.trend_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::Invalid(
                "aggregator.trend_tolerance must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
