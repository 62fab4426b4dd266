//! Layered configuration loading (§6 ambient): compiled-in
//! `SidecarConfig::default()`, overridden by `SIDECAR_`-prefixed
//! environment variables via the `config` crate, validated once before the
//! first snapshot is published.
//!
//! Nested fields use the `config` crate's double-underscore convention,
//! e.g. `SIDECAR_QUEUE__MAX_SIZE=10000` or
//! `SIDECAR_SAMPLING__RATES__EVENTS=0.5`.

use sidecar_core::config::{ConfigError, SidecarConfig};

/// Load and validate the startup configuration snapshot.
///
/// Returns `ConfigError` both for a malformed environment layer (the
/// `config` crate's deserialization failure is wrapped as an `Invalid`
/// message) and for a well-formed but semantically invalid configuration
/// (caught by `SidecarConfig::validate`).
pub fn load() -> Result<SidecarConfig, ConfigError> {
    let defaults = SidecarConfig::default();

    let figment = config::Config::builder()
        .add_source(config::Config::try_from(&defaults).map_err(|e| ConfigError::Invalid {
            message: format!("failed to seed config defaults: {e}"),
        })?)
        .add_source(
            config::Environment::with_prefix("SIDECAR")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ConfigError::Invalid {
            message: format!("failed to build configuration: {e}"),
        })?;

    let config: SidecarConfig = figment.try_deserialize().map_err(|e| ConfigError::Invalid {
        message: format!("failed to deserialize configuration: {e}"),
    })?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[path = "config_loader_tests.rs"]
mod tests;
