//! Allocator configuration
//!
//! Layered: built-in defaults, an optional TOML file, then environment
//! variables prefixed with `ADDONPACK__` (e.g. `ADDONPACK__LOADER__MAX_CONCURRENT_LOADS=4`).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Maximum drawables per (addon, partition)
pub const MAX_DRAWABLES_PER_PARTITION: usize = 128;

/// Concurrent parses allowed process-wide
pub const DEFAULT_CONCURRENT_LOADS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Capacity of one partition inside one addon
    pub max_drawables_per_partition: usize,
    /// High LOD polygon count above which details carry a warning
    pub polygon_warning_threshold: u32,
    /// Import batches larger than this are classified in parallel
    pub parallel_classify_threshold: usize,
    pub loader: LoaderConfig,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_drawables_per_partition: MAX_DRAWABLES_PER_PARTITION,
            polygon_warning_threshold: 20_000,
            parallel_classify_threshold: 64,
            loader: LoaderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub max_concurrent_loads: usize,
    /// How long a caller joining an in-flight load waits for it
    pub wait_timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: DEFAULT_CONCURRENT_LOADS,
            wait_timeout_secs: 30,
        }
    }
}

impl LoaderConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

impl AllocatorConfig {
    /// Load configuration from an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix("ADDONPACK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Config(format!("Failed to read configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_drawables_per_partition == 0 {
            return Err(Error::Config(
                "max_drawables_per_partition must be greater than 0".to_string(),
            ));
        }
        if self.loader.max_concurrent_loads == 0 {
            return Err(Error::Config(
                "loader.max_concurrent_loads must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::SerializationError(format!("Failed to render config: {}", e)))
    }
}
