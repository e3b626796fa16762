//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "CITELINK_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "citelink.db";

/// TOML configuration file (`~/.config/citelink/citelink.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder holding the database
    pub root_folder: Option<String>,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Contact email for polite API pools (Unpaywall requires one)
    pub contact_email: Option<String>,
    /// CORE API key (optional, raises CORE rate limits)
    pub core_api_key: Option<String>,
    /// Batch engine tunables
    pub engine: EngineSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Batch engine tunables from the `[engine]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Wall-clock budget per invocation
    pub budget_seconds: u64,
    /// Items processed between budget checks
    pub check_stride: usize,
    /// Delay before a paused run continues
    pub continuation_delay_seconds: u64,
    /// Pause after each uncached resolution
    pub resolution_spacing_ms: u64,
    /// Result cache lifetime
    pub cache_ttl_hours: u64,
}

/// Longest accepted result cache lifetime (ten years)
pub const MAX_CACHE_TTL_HOURS: u64 = 10 * 365 * 24;

impl EngineSettings {
    /// Result cache lifetime
    pub fn cache_ttl(&self) -> Result<Duration> {
        if self.cache_ttl_hours > MAX_CACHE_TTL_HOURS {
            return Err(Error::Config(format!(
                "engine.cache_ttl_hours must be at most {}, got {}",
                MAX_CACHE_TTL_HOURS, self.cache_ttl_hours
            )));
        }
        self.cache_ttl_hours
            .checked_mul(60 * 60)
            .map(Duration::from_secs)
            .ok_or_else(|| Error::Config("engine.cache_ttl_hours overflows".to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.cache_ttl().map(|_| ())
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            budget_seconds: 330,
            check_stride: 5,
            continuation_delay_seconds: 30,
            resolution_spacing_ms: 1000,
            cache_ttl_hours: 6,
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_config: Option<&TomlConfig>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(root_folder) = toml_config.and_then(|c| c.root_folder.as_deref()) {
        return PathBuf::from(root_folder);
    }

    get_default_root_folder()
}

/// Get default configuration file path for the platform
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("citelink").join("citelink.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/citelink
        dirs::data_local_dir()
            .map(|d| d.join("citelink"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/citelink"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("citelink"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/citelink"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("citelink"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\citelink"))
    } else {
        PathBuf::from("./citelink_data")
    }
}

/// Load TOML configuration
///
/// A missing file yields defaults; a malformed file is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    config.engine.validate()?;
    Ok(config)
}

/// Write TOML configuration atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Standard User-Agent for outbound HTTP requests
pub fn get_user_agent() -> String {
    format!(
        "citelink/{} (https://github.com/citelink/citelink)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Creates the root folder and locates files inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create root folder directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            tracing::info!(path = %self.root_folder.display(), "Created root folder");
        }
        Ok(())
    }

    /// Path of the SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}
