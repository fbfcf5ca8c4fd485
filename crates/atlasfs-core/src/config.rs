//! Configuration for atlasfs servers
//!
//! Both server roles read one TOML file with a section per role; every key
//! has a default, so an empty or absent file is a valid configuration.
//! Binaries take the file from an explicit `--config` path or from the
//! platform config directory, then apply command-line overrides on top.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{REGISTRATION_PORT, SERVICE_PORT};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Naming-server settings
    pub naming: NamingConfig,
    /// Storage-server settings
    pub storage: StorageConfig,
}

/// Naming-server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Bind address for both interfaces
    pub bind: IpAddr,
    /// Port of the client-facing Service interface
    pub service_port: u16,
    /// Port of the storage-facing Registration interface
    pub registration_port: u16,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            service_port: SERVICE_PORT,
            registration_port: REGISTRATION_PORT,
        }
    }
}

impl NamingConfig {
    pub fn service_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.service_port)
    }

    pub fn registration_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.registration_port)
    }
}

/// Storage-server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Local directory whose files this server hosts
    pub root: PathBuf,
    /// Bind address for both capability interfaces
    pub bind: IpAddr,
    /// Port of the Storage (byte I/O) interface; 0 = system-assigned
    pub storage_port: u16,
    /// Port of the Command (mutation) interface; 0 = system-assigned
    pub command_port: u16,
    /// Hostname advertised to the naming server and to clients
    pub advertise_host: String,
    /// Hostname of the naming server
    pub naming_host: String,
    /// Registration port of the naming server
    pub naming_port: u16,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            storage_port: 0,
            command_port: 0,
            advertise_host: "127.0.0.1".into(),
            naming_host: "127.0.0.1".into(),
            naming_port: REGISTRATION_PORT,
        }
    }
}

impl StorageConfig {
    pub fn storage_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.storage_port)
    }

    pub fn command_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.command_port)
    }

    /// `host:port` of the naming server's registration interface.
    pub fn naming_endpoint(&self) -> String {
        format!("{}:{}", self.naming_host, self.naming_port)
    }
}

impl Config {
    /// Reads the configuration from the platform config directory.
    ///
    /// A platform without a config directory, an absent file, and an
    /// unreadable or malformed file all fall back to the defaults; only
    /// the last of those is worth a warning.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            debug!("no config directory on this platform, using defaults");
            return Self::default();
        };
        if !path.exists() {
            debug!("no config file at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring config file: {e}");
                Self::default()
            }
        }
    }

    /// Reads a specific TOML configuration file, which must exist.
    /// Missing keys take their default values.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e.to_string()))?;
        let config = toml::from_str(&text)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        debug!("config loaded from {}", path.display());
        Ok(config)
    }

    /// Writes this configuration as TOML, creating missing directories on
    /// the way to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let rendered =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Render(e.to_string()))?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| ConfigError::Write(dir.to_path_buf(), e.to_string()))?;
        }
        std::fs::write(path, rendered)
            .map_err(|e| ConfigError::Write(path.to_path_buf(), e.to_string()))
    }

    /// Where `load` looks for the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("dev", "atlasfs", "atlasfs")?;
        Some(dirs.config_dir().join("atlasfs.toml"))
    }
}

/// Errors from reading or writing a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {0:?}: {1}")]
    Read(PathBuf, String),

    #[error("cannot parse {0:?}: {1}")]
    Parse(PathBuf, String),

    #[error("cannot write {0:?}: {1}")]
    Write(PathBuf, String),

    #[error("cannot render configuration: {0}")]
    Render(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_the_well_known_ports() {
        let config = Config::default();
        assert_eq!(config.naming.service_addr().port(), SERVICE_PORT);
        assert_eq!(config.naming.registration_addr().port(), REGISTRATION_PORT);
        assert_eq!(
            config.storage.naming_endpoint(),
            format!("127.0.0.1:{REGISTRATION_PORT}")
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested/atlasfs.toml");

        let mut config = Config::default();
        config.naming.service_port = 9100;
        config.storage.advertise_host = "fileserver.internal".into();
        config.save_to(&file).unwrap();

        let reloaded = Config::load_from(&file).unwrap();
        assert_eq!(reloaded.naming.service_port, 9100);
        assert_eq!(reloaded.storage.advertise_host, "fileserver.internal");
    }

    #[test]
    fn test_missing_keys_keep_their_defaults() {
        let text = "[storage]\nnaming_host = \"naming.internal\"\n";
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.storage.naming_host, "naming.internal");
        assert_eq!(config.storage.storage_port, 0);
        assert_eq!(config.naming.service_port, SERVICE_PORT);
    }

    #[test]
    fn test_load_from_requires_the_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load_from(&dir.path().join("absent.toml")),
            Err(ConfigError::Read(..))
        ));
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.toml");
        std::fs::write(&file, "naming = 17").unwrap();
        assert!(matches!(
            Config::load_from(&file),
            Err(ConfigError::Parse(..))
        ));
    }
}
