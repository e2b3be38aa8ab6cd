//! Optional TOML configuration for the `affiliate` binary.
//!
//! ```toml
//! log_filter = "affiliate_core=debug,info"
//!
//! [database]
//! backend = "sqlite"
//! connection_string = "affiliate.db"
//! ```
//!
//! Command-line flags override whatever the file sets, and `RUST_LOG`
//! overrides `log_filter`.

use std::path::{Path, PathBuf};

use affiliate_core::db::DbConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DATABASE: &str = "affiliate.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct AppConfig {
    pub database: DbConfig,
    pub log_filter: Option<String>,
}

/// The file as written. Keys left out keep the [`AppConfig::default`] value.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    database: DatabaseSection,
    log_filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatabaseSection {
    backend: Option<String>,
    connection_string: Option<String>,
}

impl From<ConfigFile> for AppConfig {
    fn from(file: ConfigFile) -> Self {
        AppConfig {
            log_filter: file.log_filter,
            ..AppConfig::default()
        }
        .with_overrides(file.database.backend, file.database.connection_string)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DbConfig {
                connection_string: DEFAULT_DATABASE.to_string(),
                ..DbConfig::default()
            },
            log_filter: None,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Flag values win over file values.
    pub fn with_overrides(
        mut self,
        backend: Option<String>,
        connection_string: Option<String>,
    ) -> Self {
        if let Some(backend) = backend {
            self.database.backend = backend;
        }
        if let Some(connection_string) = connection_string {
            self.database.connection_string = connection_string;
        }
        self
    }
}
