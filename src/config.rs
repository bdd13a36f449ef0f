//! Exporter configuration.
//!
//! Configuration is resolved once at startup from command-line flags,
//! environment variables and an optional TOML file, then shared with the
//! serving layer and the prober. Request handling never reads the
//! environment directly.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default listen address.
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";
/// Default listen port.
pub const DEFAULT_PORT: u16 = 9997;
/// Default upper bound for a single probe, in seconds.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 60;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("invalid listen address: {0}")]
    InvalidAddress(String),
    #[error("probe timeout must be greater than zero")]
    InvalidTimeout,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Command-line arguments. Every option can also come from the environment.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "restic-exporter", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "RESTIC_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the restic binary.
    #[arg(long, env = "RESTIC_EXPORTER_BIN")]
    pub restic_bin: Option<PathBuf>,

    /// Cache directory handed to restic with `--cache-dir`.
    #[arg(long, env = "RESTIC_EXPORTER_CACHEDIR")]
    pub cache_dir: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, env = "RESTIC_EXPORTER_ADDRESS")]
    pub address: Option<String>,

    /// Port to listen on.
    #[arg(long, env = "RESTIC_EXPORTER_PORT")]
    pub port: Option<u16>,

    /// Seconds a probe may run before it is aborted.
    #[arg(long, env = "RESTIC_EXPORTER_PROBE_TIMEOUT")]
    pub probe_timeout: Option<u64>,
}

/// Configuration file format. All keys are optional; missing ones fall
/// back to flags, environment, then defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub restic_bin: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub probe_timeout: Option<u64>,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Resolved exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    /// Path to the restic executable.
    pub restic_bin: PathBuf,
    /// Shared restic cache directory.
    pub cache_dir: PathBuf,
    /// Listen address.
    pub address: String,
    /// Listen port.
    pub port: u16,
    /// Upper bound for one probe, including all three restic invocations.
    pub probe_timeout: Duration,
}

impl ExporterConfig {
    /// Builds a configuration with default listen settings.
    pub fn new(restic_bin: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            restic_bin: restic_bin.into(),
            cache_dir: cache_dir.into(),
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        }
    }

    /// Loads the configuration for the given command line, reading the
    /// config file first if one was named.
    pub fn load(cli: Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    /// Merges flags and file settings. Flags (and their environment
    /// variables) win over the file.
    pub fn resolve(cli: Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let restic_bin = non_empty_path(cli.restic_bin.or(file.restic_bin))
            .ok_or(ConfigError::Missing("RESTIC_EXPORTER_BIN"))?;
        let cache_dir = non_empty_path(cli.cache_dir.or(file.cache_dir))
            .ok_or(ConfigError::Missing("RESTIC_EXPORTER_CACHEDIR"))?;

        let address = cli
            .address
            .or(file.address)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let port = cli.port.or(file.port).unwrap_or(DEFAULT_PORT);
        let timeout_secs = cli
            .probe_timeout
            .or(file.probe_timeout)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS);

        let config = Self {
            restic_bin,
            cache_dir,
            address,
            port,
            probe_timeout: Duration::from_secs(timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.restic_bin.as_os_str().is_empty() {
            return Err(ConfigError::Missing("RESTIC_EXPORTER_BIN"));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("RESTIC_EXPORTER_CACHEDIR"));
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        self.bind_addr()?;
        Ok(())
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn non_empty_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}
