//! Configuration Module
//!
//! Handles building, loading and validating cache configuration.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// Values can be built in code or loaded from environment variables with
/// sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Number of writes a generation absorbs before it rotates
    pub max_size: usize,
    /// Default lifetime for entries written without an explicit TTL, None = never expire
    pub max_age: Option<Duration>,
}

impl CacheConfig {
    /// Creates a configuration with the given capacity and no default expiration.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            max_age: None,
        }
    }

    /// Sets the default lifetime applied by `set`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `LRU_MAX_SIZE` - Cache capacity (default: 1000)
    /// - `LRU_MAX_AGE_MS` - Default entry lifetime in milliseconds (default: unset, never expire)
    ///
    /// Unparseable values fall back to the defaults. The result is not
    /// validated here; construction rejects a zero capacity or lifetime.
    pub fn from_env() -> Self {
        Self {
            max_size: env::var("LRU_MAX_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            max_age: env::var("LRU_MAX_AGE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis),
        }
    }

    // == Validate ==
    /// Checks the capacity and default lifetime.
    ///
    /// Expiry is tracked in whole milliseconds, so a `max_age` under one
    /// millisecond is rejected along with zero. Omit it for "no expiration".
    pub fn validate(&self) -> Result<()> {
        validate_max_size(self.max_size)?;
        if self.max_age.is_some_and(|age| age < Duration::from_millis(1)) {
            return Err(CacheError::InvalidConfiguration(
                "`max_age` must be at least 1ms".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            max_age: None,
        }
    }
}

/// Rejects a zero capacity. Shared by construction and `resize`.
pub(crate) fn validate_max_size(max_size: usize) -> Result<()> {
    if max_size == 0 {
        return Err(CacheError::InvalidConfiguration(
            "`max_size` must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_size, 1000);
        assert_eq!(config.max_age, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("LRU_MAX_SIZE");
        env::remove_var("LRU_MAX_AGE_MS");

        let config = CacheConfig::from_env();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::new(10).with_max_age(Duration::from_millis(250));
        assert_eq!(config.max_size, 10);
        assert_eq!(config.max_age, Some(Duration::from_millis(250)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_size() {
        let result = CacheConfig::new(0).validate();
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_config_rejects_zero_max_age() {
        let result = CacheConfig::new(10).with_max_age(Duration::ZERO).validate();
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_config_rejects_sub_millisecond_max_age() {
        let result = CacheConfig::new(10)
            .with_max_age(Duration::from_micros(500))
            .validate();
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));

        let config = CacheConfig::new(10).with_max_age(Duration::from_millis(1));
        assert!(config.validate().is_ok());
    }
}
