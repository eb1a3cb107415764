//! Configuration validation with range checks.

use std::collections::HashSet;

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache.ttl_secs must be > 0".into(),
            ));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache.sweep_interval_secs must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.fetch_timeout_ms must be > 0".into(),
            ));
        }

        let mut routes = HashSet::new();
        for stream in &self.streams {
            if stream.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "streams.name must not be empty".into(),
                ));
            }
            if stream.interval_secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "streams.interval_secs must be > 0 (stream {:?})",
                    stream.name
                )));
            }
            if !stream.route.starts_with('/') {
                return Err(ConfigError::ValidationError(format!(
                    "streams.route must start with '/' (got {:?})",
                    stream.route
                )));
            }
            if !routes.insert(stream.route.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "streams.route {:?} is used twice",
                    stream.route
                )));
            }
        }
        Ok(())
    }
}
