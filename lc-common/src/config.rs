//! Configuration loading and data folder resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable naming the data folder
pub const DATA_DIR_ENV: &str = "LIFECURRICULUM_DATA_DIR";

/// Environment variable carrying the YouTube Data API key
pub const YOUTUBE_KEY_ENV: &str = "LIFECURRICULUM_YOUTUBE_KEY";

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Folder holding the SQLite database
    pub data_dir: PathBuf,
    /// HTTP bind address
    pub bind: SocketAddr,
    /// YouTube Data API key; search falls back to placeholders without it
    pub youtube_api_key: Option<String>,
}

/// Subset of settings readable from the TOML config file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    bind: Option<SocketAddr>,
    youtube_api_key: Option<String>,
}

impl ServerConfig {
    /// Resolve configuration from CLI arguments, environment, config file
    /// and defaults, in that priority order.
    pub fn resolve(
        cli_data_dir: Option<&Path>,
        cli_bind: Option<SocketAddr>,
    ) -> Result<ServerConfig> {
        let file = load_config_file().unwrap_or_default();

        let data_dir = cli_data_dir
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(DATA_DIR_ENV).ok().map(PathBuf::from))
            .or(file.data_dir)
            .unwrap_or_else(default_data_dir);

        let bind = cli_bind
            .or(file.bind)
            .unwrap_or_else(|| "127.0.0.1:5870".parse().unwrap());

        let youtube_api_key = std::env::var(YOUTUBE_KEY_ENV)
            .ok()
            .or(file.youtube_api_key);

        Ok(ServerConfig {
            data_dir,
            bind,
            youtube_api_key,
        })
    }

    /// Create the data folder if missing
    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Path of the SQLite database inside the data folder
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("lifecurriculum.db")
    }
}

/// Locate and parse the platform config file, if present
fn load_config_file() -> Result<ConfigFile> {
    let path = config_file_path()?;
    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Default configuration file path for the platform
fn config_file_path() -> Result<PathBuf> {
    let user_config = dirs::config_dir()
        .map(|d| d.join("lifecurriculum").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if user_config.exists() {
        return Ok(user_config);
    }

    // System-wide fallback on Linux
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/lifecurriculum/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config(format!(
        "Config file not found: {}",
        user_config.display()
    )))
}

/// OS-dependent default data folder path
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lifecurriculum"))
        .unwrap_or_else(|| PathBuf::from("./lifecurriculum_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_has_highest_priority() {
        let dir = PathBuf::from("/tmp/lc-test-cli");
        let config = ServerConfig::resolve(Some(&dir), None).unwrap();
        assert_eq!(config.data_dir, dir);
    }

    #[test]
    fn test_default_bind_address() {
        let config = ServerConfig::resolve(Some(Path::new("/tmp/lc")), None).unwrap();
        assert_eq!(config.bind.port(), 5870);
    }

    #[test]
    fn test_database_path_under_data_dir() {
        let config = ServerConfig::resolve(Some(Path::new("/tmp/lc")), None).unwrap();
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/lc/lifecurriculum.db")
        );
    }
}
