//! Configuration management for graphfs
//!
//! Settings come from a TOML file, overridden by `GRAPHFS_*` environment
//! variables, overridden by CLI flags. The storage backend is selected here
//! once at startup and never swapped at runtime.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Available storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Volatile in-process map, single process only
    Memory,
    /// Embedded ordered key-value store on local disk
    Sled,
    /// Wide-column cluster store (requires the `cassandra` feature)
    Cassandra,
    /// Delegate every operation to a remote graphfs server
    Proxy,
}

impl std::str::FromStr for StorageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(StorageType::Memory),
            "sled" => Ok(StorageType::Sled),
            "cassandra" => Ok(StorageType::Cassandra),
            "proxy" => Ok(StorageType::Proxy),
            other => Err(Error::config(format!(
                "invalid storage type: {}. Valid options: memory, sled, cassandra, proxy",
                other
            ))),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: SocketAddr,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend type
    pub storage_type: StorageType,

    /// Backend connection info: sled data path, Cassandra contact point,
    /// or the remote server's WebSocket URL for the proxy backend
    pub uri: String,

    /// Local cache directory used by the proxy backend
    pub cache_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".parse().unwrap(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            uri: String::new(),
            cache_dir: PathBuf::from("./data/cache"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then config file if present, then
    /// environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| Error::config(format!("failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        use std::env;

        if let Ok(addr) = env::var("GRAPHFS_HTTP_ADDR") {
            self.server.http_addr = addr
                .parse()
                .map_err(|e| Error::config(format!("invalid HTTP address: {}", e)))?;
        }

        if let Ok(storage_type) = env::var("GRAPHFS_STORAGE_TYPE") {
            self.storage.storage_type = storage_type.parse()?;
        }

        if let Ok(uri) = env::var("GRAPHFS_STORAGE_URI") {
            self.storage.uri = uri;
        }

        if let Ok(level) = env::var("GRAPHFS_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("invalid log level")),
        }

        if self.storage.storage_type == StorageType::Proxy && self.storage.uri.is_empty() {
            return Err(Error::config(
                "the proxy backend requires a remote server URL in storage.uri",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.storage_type, StorageType::Memory);
    }

    #[test]
    fn storage_type_parses() {
        assert_eq!("sled".parse::<StorageType>().unwrap(), StorageType::Sled);
        assert!("bolt".parse::<StorageType>().is_err());
    }

    #[test]
    fn proxy_requires_uri() {
        let mut config = Config::default();
        config.storage.storage_type = StorageType::Proxy;
        assert!(config.validate().is_err());
    }
}
