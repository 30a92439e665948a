//! Client configuration at `~/.blade/config.toml`.
//!
//! Provides default host, credentials, and request timeout.
//! CLI flags always override config file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Default connection settings.
    #[serde(default)]
    pub default: DefaultConfig,
}

/// Default connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultConfig {
    /// Relay host (empty = built-in default).
    #[serde(default)]
    pub host: String,

    /// Project identifier sent in `blade.connect`.
    #[serde(default)]
    pub project: String,

    #[serde(default)]
    pub token: String,

    /// Seconds to wait for a reply before a call times out.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            project: String::new(),
            token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &str) -> Result<Self> {
        let path = Path::new(path);
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

/// Default location: `~/.blade/config.toml`.
pub fn default_path() -> String {
    let home = dirs::home_dir().unwrap_or_default();
    home.join(".blade")
        .join("config.toml")
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.default.timeout_secs, 10);
        assert!(cfg.default.host.is_empty());
        assert!(cfg.default.token.is_empty());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[default]
host = "relay.example.com"
project = "p-123"
token = "secret"
timeout_secs = 30
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.default.host, "relay.example.com");
        assert_eq!(cfg.default.project, "p-123");
        assert_eq!(cfg.default.token, "secret");
        assert_eq!(cfg.default.timeout_secs, 30);
    }

    #[test]
    fn parse_partial_toml_config() {
        let toml_str = r#"
[default]
token = "secret"
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.default.token, "secret");
        assert_eq!(cfg.default.timeout_secs, 10); // default
        assert!(cfg.default.project.is_empty());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let cfg = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.default.timeout_secs, 10);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[default]\nproject = \"p-123\"\ntoken = \"secret\"\n").unwrap();

        let cfg = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.default.project, "p-123");
        assert_eq!(cfg.default.token, "secret");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[default\nhost = ").unwrap();
        assert!(Config::load(path.to_str().unwrap()).is_err());
    }
}
