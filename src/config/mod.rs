//! Configuration for geogrid

mod geocoder;
mod logging;
mod pipeline;

pub use geocoder::{GeocoderConfig, InputConfig};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use pipeline::{CheckpointConfig, GridConfig};

use crate::grid::geohash::MAX_PRECISION;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "geogrid.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Merchant table
    #[serde(default)]
    pub input: InputConfig,
    /// Remote geocoder
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    /// Checkpoint / partial results
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Grid output
    #[serde(default)]
    pub grid: GridConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate all configuration fields.
    ///
    /// Collects every problem and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Geocoder
        if self.geocoder.timeout_secs == 0 {
            errors.push("geocoder timeout_secs must be positive".to_string());
        }
        if self.geocoder.max_attempts == 0 {
            errors.push("geocoder max_attempts must be at least 1".to_string());
        }
        for (name, endpoint) in [
            ("address_endpoint", &self.geocoder.address_endpoint),
            ("keyword_endpoint", &self.geocoder.keyword_endpoint),
        ] {
            if let Err(e) = url::Url::parse(endpoint) {
                errors.push(format!("geocoder {} '{}' is not a valid URL: {}", name, endpoint, e));
            }
        }

        // Checkpoint
        if self.checkpoint.batch_size == 0 {
            errors.push("checkpoint batch_size must be positive".to_string());
        }
        if self.checkpoint.progress_interval == 0 {
            errors.push("checkpoint progress_interval must be positive".to_string());
        }
        if self.checkpoint.checkpoint_path.as_os_str().is_empty() {
            errors.push("checkpoint checkpoint_path must not be empty".to_string());
        }
        if self.checkpoint.results_path.as_os_str().is_empty() {
            errors.push("checkpoint results_path must not be empty".to_string());
        }

        // Grid
        if !(1..=MAX_PRECISION).contains(&self.grid.precision) {
            errors.push(format!(
                "grid precision must be between 1 and {}, got {}",
                MAX_PRECISION, self.grid.precision
            ));
        }
        if self.grid.output_dir.as_os_str().is_empty() {
            errors.push("grid output_dir must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
