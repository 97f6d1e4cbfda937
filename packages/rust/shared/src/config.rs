//! Application configuration for conductor.
//!
//! User config lives at `~/.conductor/conductor.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConductorError, Result};
use crate::plan::QualityThresholds;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "conductor.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".conductor";

// ---------------------------------------------------------------------------
// Config structs (matching conductor.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Coordinator defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Collection plan execution settings.
    #[serde(default)]
    pub collection: CollectionSection,

    /// Fallback quality thresholds for plans that set none.
    #[serde(default)]
    pub quality: QualityThresholds,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Per-invocation deadline for units.
    #[serde(default = "default_unit_timeout_ms")]
    pub unit_timeout_ms: u64,

    /// Admission limit for bounded-parallel runs.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Whether sequential runs stop at the first failure.
    #[serde(default)]
    pub stop_on_failure: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            unit_timeout_ms: default_unit_timeout_ms(),
            max_concurrent: default_max_concurrent(),
            stop_on_failure: false,
        }
    }
}

fn default_unit_timeout_ms() -> u64 {
    30_000
}
fn default_max_concurrent() -> usize {
    4
}

/// `[collection]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSection {
    /// Per-source deadline for `collect_enriched`.
    #[serde(default = "default_collector_timeout_ms")]
    pub collector_timeout_ms: u64,

    /// Concurrent source limit; `0` runs every source at once.
    #[serde(default)]
    pub max_concurrent_sources: usize,
}

impl Default for CollectionSection {
    fn default() -> Self {
        Self {
            collector_timeout_ms: default_collector_timeout_ms(),
            max_concurrent_sources: 0,
        }
    }
}

fn default_collector_timeout_ms() -> u64 {
    120_000
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Deadline applied when neither the step nor the unit sets one.
    pub unit_timeout: Duration,
    /// Default admission limit for bounded-parallel runs.
    pub max_concurrent: usize,
    /// Default stop-on-failure flag for sequential runs.
    pub stop_on_failure: bool,
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(ConductorError::config("max_concurrent must be at least 1"));
        }
        if self.unit_timeout.is_zero() {
            return Err(ConductorError::config("unit_timeout_ms must be positive"));
        }
        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CoordinatorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            unit_timeout: Duration::from_millis(config.defaults.unit_timeout_ms),
            max_concurrent: config.defaults.max_concurrent,
            stop_on_failure: config.defaults.stop_on_failure,
        }
    }
}

/// Runtime collection configuration.
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Deadline for a single collector call.
    pub collector_timeout: Duration,
    /// Concurrent source limit; `0` means one slot per scheduled source.
    pub max_concurrent_sources: usize,
    /// Used when a plan's own thresholds are empty.
    pub default_thresholds: QualityThresholds,
}

impl CollectionConfig {
    /// Effective admission limit for a plan with `source_count` runnable sources.
    pub fn concurrency_for(&self, source_count: usize) -> usize {
        if self.max_concurrent_sources == 0 {
            source_count.max(1)
        } else {
            self.max_concurrent_sources
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CollectionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            collector_timeout: Duration::from_millis(config.collection.collector_timeout_ms),
            max_concurrent_sources: config.collection.max_concurrent_sources,
            default_thresholds: config.quality,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.conductor/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ConductorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.conductor/conductor.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ConductorError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ConductorError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    config.quality.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ConductorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ConductorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ConductorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
