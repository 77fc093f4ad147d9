//! Configuration for the heartrater collector and relay.

use crate::core::{DEFAULT_CAPACITY, DEFAULT_PANIC_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "HEARTRATER_SERVER_PORT";

/// Main configuration shared by `serve` and `relay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the collector binds to
    pub host: String,

    /// Port the collector listens on
    pub port: u16,

    /// File holding the shared-secret token
    pub token_path: PathBuf,

    /// Directory with static assets (the logo)
    pub static_dir: PathBuf,

    /// Number of samples kept in the rolling window
    pub capacity: usize,

    /// Trailing zero samples that raise a panic
    pub panic_threshold: usize,

    /// Collector base URL used by the relay
    pub collector_url: String,

    /// Pause before reconnecting to the sensor
    #[serde(with = "duration_serde")]
    pub retry_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".heartrater");
        let share_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("heartrater");

        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
            token_path: home_dir.join(".server_token"),
            static_dir: share_dir.join("static"),
            capacity: DEFAULT_CAPACITY,
            panic_threshold: DEFAULT_PANIC_THRESHOLD,
            collector_url: "http://127.0.0.1:80".to_string(),
            retry_delay: Duration::from_secs(3),
        }
    }
}

impl Config {
    /// Load configuration from the default location, then apply the
    /// environment override.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_override(std::env::var(PORT_ENV).ok().as_deref())?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("heartrater")
            .join("config.json")
    }

    /// Override the port from the value of [`PORT_ENV`], if set.
    pub fn apply_env_override(&mut self, port: Option<&str>) -> Result<(), ConfigError> {
        if let Some(raw) = port {
            self.port = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: PORT_ENV,
                value: raw.to_string(),
            })?;
        }
        Ok(())
    }

    /// Read the shared-secret token, trimming surrounding whitespace.
    pub fn read_token(&self) -> Result<String, ConfigError> {
        read_token_file(&self.token_path)
    }

    pub fn logo_path(&self) -> PathBuf {
        self.static_dir.join("logo.jpeg")
    }
}

/// Read and trim a token file; an empty token is rejected.
pub fn read_token_file(path: &Path) -> Result<String, ConfigError> {
    let token = std::fs::read_to_string(path)?.trim().to_string();
    if token.is_empty() {
        return Err(ConfigError::EmptyToken(path.to_path_buf()));
    }
    Ok(token)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
    #[error("Token file {0:?} is empty")]
    EmptyToken(PathBuf),
    #[error("Invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 80);
        assert_eq!(config.capacity, 360);
        assert_eq!(config.panic_threshold, 20);
        assert_eq!(config.retry_delay, Duration::from_secs(3));
        assert!(config.token_path.ends_with(".heartrater/.server_token"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_partial_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.port = 8080;
        config.retry_delay = Duration::from_secs(7);
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);

        // Missing fields fall back to their defaults.
        std::fs::write(&path, r#"{ "port": 9000 }"#).unwrap();
        let partial = Config::load_from(&path).unwrap();
        assert_eq!(partial.port, 9000);
        assert_eq!(partial.capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apply_env_override(None).unwrap();
        assert_eq!(config.port, 80);

        config.apply_env_override(Some("5000")).unwrap();
        assert_eq!(config.port, 5000);

        assert!(matches!(
            config.apply_env_override(Some("eighty")),
            Err(ConfigError::InvalidEnv { .. })
        ));
    }

    #[test]
    fn test_token_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".server_token");

        std::fs::write(&path, "  s3cret\n").unwrap();
        assert_eq!(read_token_file(&path).unwrap(), "s3cret");

        std::fs::write(&path, "\n").unwrap();
        assert!(matches!(read_token_file(&path), Err(ConfigError::EmptyToken(_))));
    }
}
