//! Workspace configuration
//!
//! One TOML document configures every component. Every section and field
//! is optional; missing values take their defaults.
//!
//! ```toml
//! name = "braking-system"
//!
//! [query]
//! default_page_size = 100
//!
//! [retry]
//! max_retries = 5
//! base_delay_ms = 250
//! max_delay_ms = 8000
//!
//! [store]
//! changelog_capacity = 512
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use triview_query::{QueryConfig, RetryConfig};
use triview_store::StoreConfig;

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be rendered
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Values parse but are unusable
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a whole workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriviewConfig {
    /// Instance name, used in log fields
    pub name: String,
    /// Query coordinator defaults
    pub query: QueryConfig,
    /// Retry policy
    pub retry: RetryConfig,
    /// Store tuning
    pub store: StoreConfig,
}

impl Default for TriviewConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            query: QueryConfig::default(),
            retry: RetryConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl TriviewConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With instance name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// With query defaults
    #[inline]
    #[must_use]
    pub fn with_query(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// With store tuning
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), name = %config.name, "loaded config");
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values no component can run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "query.default_page_size must be positive".to_string(),
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.max_delay_ms ({}) is below retry.base_delay_ms ({})",
                self.retry.max_delay_ms, self.retry.base_delay_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_document_gives_defaults() {
        let config = TriviewConfig::from_toml_str("").unwrap();
        assert_eq!(config, TriviewConfig::default());
        assert_eq!(config.query.default_page_size, 50);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay_ms, 200);
        assert_eq!(config.retry.max_delay_ms, 5_000);
        assert_eq!(config.store.changelog_capacity, 256);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = TriviewConfig::from_toml_str(
            r#"
            name = "brakes"
            [retry]
            max_retries = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "brakes");
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.base_delay_ms, 200);
        assert_eq!(config.query, QueryConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = TriviewConfig::from_toml_str("[query]\ndefault_page_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = TriviewConfig::from_toml_str("[retry]\nbase_delay_ms = 900\nmax_delay_ms = 10")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = TriviewConfig::from_toml_str("[store]\nchangelog_capacity = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_round_trips_through_file() -> anyhow::Result<()> {
        let config = TriviewConfig::new()
            .with_name("roundtrip")
            .with_store(StoreConfig::new().with_changelog_capacity(16));

        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(config.to_toml_string()?.as_bytes())?;

        let loaded = TriviewConfig::load(file.path())?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = TriviewConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }
}
