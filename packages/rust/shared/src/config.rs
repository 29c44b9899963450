//! Application configuration for htmlcombine.
//!
//! User config lives at `~/.htmlcombine/htmlcombine.toml`.
//! CLI flags override manifest values, which override config file values,
//! which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CombineError, Result};
use crate::types::GroupId;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "htmlcombine.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".htmlcombine";

/// Legacy test used when nothing else is configured: `legacy`, any case.
pub const DEFAULT_LEGACY_TEST: &str = "(?i)legacy";

// ---------------------------------------------------------------------------
// Config structs (matching htmlcombine.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults applied to every pipeline.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Tag references with `type="module"` / `nomodule` after combining.
    #[serde(default)]
    pub alter_tags: bool,

    /// Regular expression that marks a reference as legacy.
    #[serde(default = "default_legacy_test")]
    pub legacy_test: String,

    /// Give up on stranded barriers after this many ms. Unset waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barrier_timeout_ms: Option<u64>,

    /// Output format for `run`: "html" or "json".
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            alter_tags: false,
            legacy_test: default_legacy_test(),
            barrier_timeout_ms: None,
            format: default_format(),
        }
    }
}

fn default_legacy_test() -> String {
    DEFAULT_LEGACY_TEST.into()
}
fn default_format() -> String {
    "html".into()
}

// ---------------------------------------------------------------------------
// Combine options (runtime, merged from config + manifest + CLI flags)
// ---------------------------------------------------------------------------

/// Per-participant options for the combine plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineOptions {
    /// Coordination group; participants only wait on their own group.
    pub group_id: GroupId,
    /// Run the tag rewriting pass after combining.
    pub alter_tags: bool,
    /// Regular expression classifying legacy references.
    pub legacy_test: String,
    /// Deprecated: substring marking legacy references. Wins over `legacy_test`.
    pub legacy_prefix: Option<String>,
    /// Deprecated: substring marking legacy references. Wins over `legacy_test`.
    pub legacy_suffix: Option<String>,
    /// Stranding timeout for the barrier wait.
    pub barrier_timeout: Option<Duration>,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            group_id: GroupId::Default,
            alter_tags: false,
            legacy_test: default_legacy_test(),
            legacy_prefix: None,
            legacy_suffix: None,
            barrier_timeout: None,
        }
    }
}

impl From<&AppConfig> for CombineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            alter_tags: config.defaults.alter_tags,
            legacy_test: config.defaults.legacy_test.clone(),
            barrier_timeout: config.defaults.barrier_timeout_ms.map(Duration::from_millis),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.htmlcombine/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CombineError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.htmlcombine/htmlcombine.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| CombineError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CombineError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_in(&config_dir()?)
}

/// Write a default config file into `dir`, creating it if needed.
pub fn init_config_in(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| CombineError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CombineError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CombineError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
