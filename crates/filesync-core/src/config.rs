//! Configuration system for filesync.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FILESYNC_CONFIG (explicit override)
//!   2. ./filesync.toml
//!
//! Every value also answers to a FILESYNC_* environment variable, so a
//! container deployment needs no file at all.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Deployment environment. Development additionally registers the Echo
/// handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub env: Environment,
    /// TCP port the TLS listener binds.
    pub port: u16,
    pub cache: CacheConfig,
    pub tls: TlsConfig,
    pub auth: AuthConfig,
    /// Root of per-user storage directories.
    pub data_dir: PathBuf,
    /// Log filter when RUST_LOG is unset, e.g. "debug" or "filesyncd=trace".
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Capacity of the blob cache, in entries.
    pub file_size: usize,
    /// Capacity of the metadata cache, in entries.
    pub meta_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub dir: PathBuf,
    pub cert: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Raw byte length of the authentication challenge.
    pub challenge_len: usize,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            env: Environment::Development,
            port: 443,
            cache: CacheConfig::default(),
            tls: TlsConfig::default(),
            auth: AuthConfig::default(),
            data_dir: PathBuf::from("_data"),
            log_level: "debug".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file_size: 1_000,
            meta_size: 100_000,
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("_certs"),
            cert: "server.crt".to_string(),
            key: "server.key".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { challenge_len: 32 }
    }
}

impl TlsConfig {
    pub fn cert_path(&self) -> PathBuf {
        self.dir.join(&self.cert)
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.join(&self.key)
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl Config {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            Config::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FILESYNC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("filesync.toml"))
    }

    /// Apply FILESYNC_* env var overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("FILESYNC_ENV") {
            self.env = match v.as_str() {
                "development" => Environment::Development,
                "production" => Environment::Production,
                other => {
                    return Err(ConfigError::InvalidValue("FILESYNC_ENV", other.to_string()))
                }
            };
        }
        if let Ok(v) = std::env::var("FILESYNC_PORT") {
            self.port = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FILESYNC_PORT", v.clone()))?;
        }
        if let Ok(v) = std::env::var("FILESYNC_CACHE_FILE_SIZE") {
            self.cache.file_size = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FILESYNC_CACHE_FILE_SIZE", v.clone()))?;
        }
        if let Ok(v) = std::env::var("FILESYNC_CACHE_META_SIZE") {
            self.cache.meta_size = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FILESYNC_CACHE_META_SIZE", v.clone()))?;
        }
        if let Ok(v) = std::env::var("FILESYNC_TLS_DIR") {
            self.tls.dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FILESYNC_TLS_CERT") {
            self.tls.cert = v;
        }
        if let Ok(v) = std::env::var("FILESYNC_TLS_KEY") {
            self.tls.key = v;
        }
        if let Ok(v) = std::env::var("FILESYNC_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FILESYNC_AUTH_CHALLENGE_LEN") {
            self.auth.challenge_len = v.parse().map_err(|_| {
                ConfigError::InvalidValue("FILESYNC_AUTH_CHALLENGE_LEN", v.clone())
            })?;
        }
        if let Ok(v) = std::env::var("FILESYNC_LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
