//! Client configuration
//!
//! Loaded from `<config_dir>/blogadmin/config.toml`; every field has a default
//! so a missing file (or a partial one) is valid.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default reason sent with a ban when the operator gives none
pub const DEFAULT_BAN_REASON: &str = "Delete by admin";

/// Default ban duration in hours
pub const DEFAULT_BAN_HOURS: u32 = 100;

/// Defaults applied to `ban` when the caller omits reason or duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanPolicy {
    pub reason: String,
    pub duration_hours: u32,
}

impl Default for BanPolicy {
    fn default() -> Self {
        Self {
            reason: DEFAULT_BAN_REASON.to_string(),
            duration_hours: DEFAULT_BAN_HOURS,
        }
    }
}

/// Configuration for the transport, clients and coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:3000/api`
    pub base_url: String,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,

    pub ban: BanPolicy,

    /// Broadcast capacity for change notifications
    pub event_capacity: usize,

    /// Normalization diagnostics retained in memory
    pub diagnostics_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 15,
            ban: BanPolicy::default(),
            event_capacity: 256,
            diagnostics_capacity: 512,
        }
    }
}

impl ClientConfig {
    /// Default config file location (`~/.config/blogadmin/config.toml` on Linux)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("blogadmin").join("config.toml"))
    }

    /// Load from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::FileRead {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, or defaults when there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                message: format!("base_url must be an http(s) URL, got '{}'", self.base_url),
            });
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "timeouts must be at least one second".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                message: "event_capacity must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = ClientConfig::load(Path::new("/nonexistent/blogadmin.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.ban.reason, "Delete by admin");
        assert_eq!(config.ban.duration_hours, 100);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
base_url = "https://blog.example.com/api"

[ban]
duration_hours = 24
"#
        )
        .unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.base_url, "https://blog.example.com/api");
        assert_eq!(config.ban.duration_hours, 24);
        assert_eq!(config.ban.reason, DEFAULT_BAN_REASON);
        assert_eq!(config.request_timeout_secs, 15);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "base_url = [not toml").unwrap();
        assert!(matches!(
            ClientConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = ClientConfig::default().with_base_url("localhost:3000");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }
}
