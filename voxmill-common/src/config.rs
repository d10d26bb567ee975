//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the root folder for all Voxmill data
pub const ROOT_FOLDER_ENV: &str = "VOXMILL_ROOT_FOLDER";

/// Logging configuration shared by every service TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` key of the TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_file: Option<&Path>,
) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: TOML config file
    if let Some(config_path) = config_file {
        if let Ok(toml_content) = std::fs::read_to_string(config_path) {
            let config: toml::Value = toml::from_str(&toml_content)?;
            if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                return Ok(PathBuf::from(root_folder));
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_root_folder())
}

/// Locate the TOML config file for a service.
///
/// Looks for `<config_dir>/voxmill/<service>.toml`, then
/// `/etc/voxmill/<service>.toml` on Linux. Returns `None` when neither exists.
pub fn default_config_path(service: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", service);

    if let Some(user_config) = dirs::config_dir().map(|d| d.join("voxmill").join(&file_name)) {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/voxmill").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load and deserialize a TOML file.
///
/// A missing file is a configuration error; callers that treat the file as
/// optional should check existence first.
pub fn load_toml_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Read an environment override, ignoring blank values
pub fn env_override(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            debug!("Environment override {} applied", name);
            Some(value)
        }
        _ => None,
    }
}

/// Parse an environment override into `T`, reporting parse failures as config errors
pub fn parse_env_override<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_override(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(None),
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/voxmill (or /var/lib/voxmill for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("voxmill"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/voxmill"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("voxmill"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/voxmill"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("voxmill"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\voxmill"))
    } else {
        PathBuf::from("./voxmill_data")
    }
}
