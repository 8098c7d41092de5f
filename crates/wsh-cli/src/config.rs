//! Configuration system for the wsh CLI (§9: ambient, no wire-protocol counterpart).
//!
//! Covers the connect defaults the protocol itself leaves to the embedding
//! application: transport hint, timeouts, key store location, log level.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// wsh CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Connection defaults.
    pub connect: ConnectDefaults,
    /// Key store location.
    pub keystore: KeyStoreConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Connection defaults applied when a subcommand doesn't override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectDefaults {
    /// Default server URL, if none is given on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_url: Option<String>,
    /// Handshake timeout, seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub timeout_secs: u64,
    /// Keepalive ping interval, seconds. `0` disables keepalive.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

/// Key store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyStoreConfig {
    /// Path to the key store registry file.
    #[serde(default = "default_keystore_path")]
    pub path: PathBuf,
    /// Key entry used for pubkey auth when `--key` is not given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_key: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter, passed to `tracing_subscriber::EnvFilter`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_keepalive_secs() -> u64 {
    30
}

fn default_keystore_path() -> PathBuf {
    wsh_crypto::KeyStore::default_path()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectDefaults {
    fn default() -> Self {
        Self {
            default_url: None,
            timeout_secs: default_connect_timeout_secs(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self { path: default_keystore_path(), default_key: None }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl ConnectDefaults {
    /// Handshake timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Keepalive interval, or `None` if disabled.
    #[must_use]
    pub fn keepalive_interval(&self) -> Option<Duration> {
        if self.keepalive_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.keepalive_secs))
        }
    }
}

impl Config {
    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Default config path: `~/.config/wsh/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("wsh/config.toml")
    }

    /// Load from the default path, creating a default config file if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.connect.timeout_secs == 0 {
            anyhow::bail!("connect.timeout_secs must be greater than 0");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "invalid log level '{}': must be one of {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.connect.timeout_secs, 30);
        assert_eq!(config.connect.keepalive_secs, 30);
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.connect.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trips() {
        let config = Config::default();
        let s = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(config.connect.timeout_secs, back.connect.timeout_secs);
        assert_eq!(config.logging.level, back.logging.level);
    }

    #[test]
    fn keepalive_disabled_when_zero() {
        let mut config = Config::default();
        config.connect.keepalive_secs = 0;
        assert!(config.connect.keepalive_interval().is_none());
    }
}
