//! Configuration loading
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `BIBFLOW_CONFIG` environment variable
//! 3. User config directory (`<config_dir>/bibflow/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! Individual settings may then be overridden from the environment.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CONFIG_ENV_VAR: &str = "BIBFLOW_CONFIG";
pub const KEYWORD_DELIMITER_ENV_VAR: &str = "BIBFLOW_KEYWORD_DELIMITER";
pub const UNPAYWALL_EMAIL_ENV_VAR: &str = "BIBFLOW_UNPAYWALL_EMAIL";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "bibflow_import=info".to_string(),
        }
    }
}

/// Network fetch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-call timeout applied to every provider request
    pub timeout_secs: u64,
    /// Process-wide cap on in-flight HTTP requests
    pub max_concurrent_requests: usize,
    /// Outgoing request rate limit
    pub requests_per_second: u32,
    /// Default maximum result count for searches
    pub search_max_results: usize,
    pub user_agent: String,
    /// Contact address required by the Unpaywall API
    pub unpaywall_email: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_concurrent_requests: 4,
            requests_per_second: 5,
            search_max_results: 30,
            user_agent: format!("bibflow/{}", env!("CARGO_PKG_VERSION")),
            unpaywall_email: None,
        }
    }
}

/// Top-level TOML configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Delimiter between entries of multi-value fields such as `keywords`
    pub keyword_delimiter: char,
    /// Stamp acquired records with a `creationdate` field
    pub add_creation_date: bool,
    pub logging: LoggingConfig,
    pub fetch: FetchConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            keyword_delimiter: ',',
            add_creation_date: false,
            logging: LoggingConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Resolve, load and apply environment overrides
    ///
    /// A missing config file is not an error; defaults are used.
    pub fn load(cli_arg: Option<&Path>) -> Result<TomlConfig> {
        let mut config = match resolve_config_path(cli_arg) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(&path)?
            }
            None => {
                debug!("No configuration file found, using defaults");
                TomlConfig::default()
            }
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `BIBFLOW_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(KEYWORD_DELIMITER_ENV_VAR) {
            self.keyword_delimiter = parse_delimiter(&value)?;
        }
        if let Ok(email) = std::env::var(UNPAYWALL_EMAIL_ENV_VAR) {
            if email.trim().is_empty() {
                warn!("{} is set but empty, ignoring", UNPAYWALL_EMAIL_ENV_VAR);
            } else {
                self.fetch.unpaywall_email = Some(email.trim().to_string());
            }
        }
        Ok(())
    }
}

fn parse_delimiter(value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::Config(format!(
            "{} must be a single character, got {:?}",
            KEYWORD_DELIMITER_ENV_VAR, value
        ))),
    }
}

/// Locate the config file following the documented priority order
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    default_config_path().filter(|path| path.exists())
}

/// `<config_dir>/bibflow/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bibflow").join("config.toml"))
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}
