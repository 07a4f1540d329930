//! Loader configuration

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Loader configuration
///
/// Loadable from TOML; absent keys take their defaults:
///
/// ```toml
/// batch_size = 100
/// page_size = 1000
/// validate = true
/// generate_lookups = true
/// lookup_cache_capacity = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Completed objects per save call
    pub batch_size: usize,
    /// Rows fetched per cursor page
    pub page_size: usize,
    /// Validate objects on save (derives computed fields implicitly)
    pub validate: bool,
    /// Normalize lookup literals to codes and commit generated vocabulary
    pub generate_lookups: bool,
    /// Entries held by the lookup cache
    pub lookup_cache_capacity: u64,
}

impl LoaderConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With batch size
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// With save validation
    #[inline]
    #[must_use]
    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// With lookup generation
    #[inline]
    #[must_use]
    pub fn with_generate_lookups(mut self, generate: bool) -> Self {
        self.generate_lookups = generate;
        self
    }

    /// With lookup cache capacity
    #[inline]
    #[must_use]
    pub fn with_lookup_cache_capacity(mut self, capacity: u64) -> Self {
        self.lookup_cache_capacity = capacity;
        self
    }

    /// Reject zero batch or page sizes
    ///
    /// # Errors
    /// Returns [`LoadError::Config`] naming the offending key
    pub fn check(&self) -> Result<(), LoadError> {
        if self.batch_size == 0 {
            return Err(LoadError::Config("batch_size must be greater than zero".into()));
        }
        if self.page_size == 0 {
            return Err(LoadError::Config("page_size must be greater than zero".into()));
        }
        Ok(())
    }

    /// Parse and check TOML configuration
    ///
    /// # Errors
    /// Returns [`LoadError::Config`] on malformed or invalid input
    pub fn from_toml_str(input: &str) -> Result<Self, LoadError> {
        let config: Self = toml::from_str(input).map_err(|e| LoadError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Read, parse and check a TOML configuration file
    ///
    /// # Errors
    /// Returns [`LoadError::Config`] if the file cannot be read or is invalid
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|e| LoadError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&input)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            page_size: 1000,
            validate: true,
            generate_lookups: true,
            lookup_cache_capacity: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = LoaderConfig::new();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.page_size, 1000);
        assert!(config.validate);
        assert!(config.generate_lookups);
        assert!(config.check().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = LoaderConfig::from_toml_str("batch_size = 25\nvalidate = false\n").unwrap();
        assert_eq!(
            config,
            LoaderConfig::default().with_batch_size(25).with_validate(false)
        );
    }

    #[test]
    fn zero_sizes_rejected() {
        assert!(matches!(
            LoaderConfig::from_toml_str("page_size = 0"),
            Err(LoadError::Config(_))
        ));
        assert!(matches!(
            LoaderConfig::new().with_batch_size(0).check(),
            Err(LoadError::Config(_))
        ));
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(matches!(
            LoaderConfig::from_toml_str("batch_size = \"many\""),
            Err(LoadError::Config(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl.toml");
        std::fs::write(&path, "page_size = 50\n").unwrap();
        assert_eq!(LoaderConfig::from_path(&path).unwrap().page_size, 50);
        assert!(LoaderConfig::from_path(dir.path().join("missing.toml")).is_err());
    }
}
