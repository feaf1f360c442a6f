//! Configuration file handling

use serde::Deserialize;
use std::path::Path;

use super::paths::config_path;
use super::Result;
use crate::locator::BootstrapLayout;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Query settings
    #[serde(default)]
    pub query: QueryConfig,

    /// Overrides for the detected foreign-state layout
    #[serde(default)]
    pub layout: LayoutOverrides,
}

/// Query settings
#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    /// Size in bytes of the shared buffer launchd writes its dump into
    #[serde(default = "default_shmem_size")]
    pub shmem_size: usize,

    /// Daemon error codes meaning "no such process"
    #[serde(default = "default_not_found_codes")]
    pub not_found_codes: Vec<i64>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            shmem_size: default_shmem_size(),
            not_found_codes: default_not_found_codes(),
        }
    }
}

fn default_shmem_size() -> usize {
    1024 * 1024
}

fn default_not_found_codes() -> Vec<i64> {
    vec![3, 113]
}

/// Per-field overrides of [`BootstrapLayout`]
///
/// Unset fields keep the value detected for the running OS version.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct LayoutOverrides {
    pub slot_index: Option<usize>,
    pub flags_offset: Option<usize>,
    pub port_offset: Option<usize>,
    pub pipe_offset: Option<usize>,
    pub max_flags: Option<u64>,
}

impl LayoutOverrides {
    /// Apply these overrides on top of a detected layout
    pub fn apply(&self, mut layout: BootstrapLayout) -> BootstrapLayout {
        if let Some(v) = self.slot_index {
            layout.slot_index = v;
        }
        if let Some(v) = self.flags_offset {
            layout.flags_offset = v;
        }
        if let Some(v) = self.port_offset {
            layout.port_offset = v;
        }
        if let Some(v) = self.pipe_offset {
            layout.pipe_offset = v;
        }
        if let Some(v) = self.max_flags {
            layout.max_flags = v;
        }
        layout
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.query.shmem_size == 0 {
            return Err(super::Error::Config(
                "query.shmem_size must be greater than zero".to_string(),
            ));
        }
        self.layout
            .apply(BootstrapLayout::native())
            .validate()
            .map_err(|e| super::Error::Config(format!("[layout] {}", e)))
    }

    /// The layout to use on this host: detected per OS version, then overridden
    pub fn layout(&self) -> BootstrapLayout {
        self.layout.apply(BootstrapLayout::detect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.query.shmem_size, 1024 * 1024);
        assert_eq!(config.query.not_found_codes, vec![3, 113]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse("[layout]\nmax_flags = 255\n").unwrap();
        assert_eq!(config.query.shmem_size, 1024 * 1024);
        let layout = config.layout.apply(BootstrapLayout::LP64);
        assert_eq!(layout.max_flags, 255);
        assert_eq!(layout.pipe_offset, BootstrapLayout::LP64.pipe_offset);
    }

    #[test]
    fn test_zero_shmem_rejected() {
        let err = Config::parse("[query]\nshmem_size = 0\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_layout_override_past_record_rejected() {
        let err = Config::parse("[layout]\npipe_offset = 64\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_layout_override_misaligned_rejected() {
        let err = Config::parse("[layout]\nflags_offset = 3\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
        let err = Config::parse("[layout]\nslot_index = 100\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_bad_toml_rejected() {
        let err = Config::parse("[query\n").unwrap_err();
        assert!(matches!(err, crate::Error::ConfigParse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[query]\nnot_found_codes = [3]").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.query.not_found_codes, vec![3]);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = Config::from_file(Path::new("/nonexistent/launchd-procinfo.toml")).unwrap_err();
        assert!(matches!(err, crate::Error::FileRead { .. }));
    }
}
