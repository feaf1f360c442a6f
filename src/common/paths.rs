//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - macOS: `~/Library/Application Support/launchd-procinfo/`
//! - Linux: `~/.config/launchd-procinfo/`

use std::path::PathBuf;

/// Application directory name
const APP_NAME: &str = "launchd-procinfo";

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV: &str = "LAUNCHD_PROCINFO_CONFIG";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
///
/// `LAUNCHD_PROCINFO_CONFIG` wins over the platform default.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    config_dir().map(|dir| dir.join("config.toml"))
}
