use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::repository::{AffiliateRepository, RepositoryError};

/// Which backend to open and how to reach it.
///
/// `backend` selects a registered [`RepositoryFactory`]; `connection_string`
/// is handed to that factory untouched.
///
/// | backend    | connection_string examples          |
/// |------------|-------------------------------------|
/// | `sqlite`   | `affiliate.db`, `:memory:`          |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub backend: String,
    pub connection_string: String,
}

impl DbConfig {
    /// Parses `backend:connection` (e.g. `sqlite:affiliate.db`).
    ///
    /// A string without a backend prefix is taken as a connection string for
    /// the default backend.
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((backend, rest))
                if !backend.is_empty() && backend.chars().all(|c| c.is_ascii_lowercase()) =>
            {
                Self {
                    backend: backend.to_string(),
                    connection_string: rest.to_string(),
                }
            }
            _ => Self {
                connection_string: s.to_string(),
                ..Self::default()
            },
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            connection_string: ":memory:".to_string(),
        }
    }
}

impl fmt::Display for DbConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.connection_string)
    }
}

/// Opens repositories for one backend.
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    /// Lowercase name matched against [`DbConfig::backend`].
    fn backend_name(&self) -> &'static str;

    /// Connects and prepares the schema so the repository is usable at once.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn AffiliateRepository>, RepositoryError>;
}

/// Backend factories keyed by name.
#[derive(Default)]
pub struct RepositoryRegistry {
    factories: HashMap<&'static str, Box<dyn RepositoryFactory>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a factory, replacing any previous one with the same name.
    pub fn register(
        &mut self,
        factory: Box<dyn RepositoryFactory>,
    ) {
        self.factories.insert(factory.backend_name(), factory);
    }

    pub fn with_factory(
        mut self,
        factory: Box<dyn RepositoryFactory>,
    ) -> Self {
        self.register(factory);
        self
    }

    /// Registered backend names, sorted.
    pub fn available_backends(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// # Errors
    /// * [`RepositoryError::Configuration`] when no factory matches
    ///   `config.backend`.
    /// * Whatever the matching factory returns.
    pub async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn AffiliateRepository>, RepositoryError> {
        let factory = self
            .factories
            .get(config.backend.as_str())
            .ok_or_else(|| {
                RepositoryError::Configuration(format!(
                    "unknown backend '{}'; available: {:?}",
                    config.backend,
                    self.available_backends()
                ))
            })?;

        factory.create(config).await
    }
}
