//! JSON configuration loading.
//!
//! Every field of [`ResilienceConfig`] is optional in the file; missing
//! fields take their defaults. Loaded configs are validated before use.

use bulwark_types::{ConfigError, ResilienceConfig};
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tracing::{debug, info};
use validator::Validate;

/// Parse and validate a config from JSON text.
pub fn load_from_str(content: &str) -> Result<ResilienceConfig, ConfigError> {
    let config: ResilienceConfig =
        serde_json::from_str(content).map_err(|e| ConfigError::from_json_error(&e))?;
    config.validate().map_err(|e| ConfigError::from_validation_errors(&e))?;
    Ok(config)
}

/// Load a config file. A missing file is [`ConfigError::NotFound`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ResilienceConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        IoErrorKind::NotFound => ConfigError::NotFound { path: path.display().to_string() },
        _ => ConfigError::from_io_error(&e),
    })?;

    let config = load_from_str(&content)?;
    info!(
        path = %path.display(),
        endpoint_policies = config.endpoint_policies.len(),
        endpoint_overrides = config.endpoint_overrides.len(),
        "Loaded resilience config"
    );
    Ok(config)
}

/// Like [`load_from_path`], but a missing file yields the defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ResilienceConfig, ConfigError> {
    match load_from_path(path.as_ref()) {
        Err(ConfigError::NotFound { path }) => {
            debug!(%path, "No resilience config found, using defaults");
            Ok(ResilienceConfig::default())
        },
        other => other,
    }
}

/// Write `config` as pretty JSON via a temp file and rename.
pub fn save_to_path(path: impl AsRef<Path>, config: &ResilienceConfig) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(config).map_err(|e| ConfigError::from_json_error(&e))?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content).map_err(|e| ConfigError::from_io_error(&e))?;
    fs::rename(&temp_path, path).map_err(|e| ConfigError::from_io_error(&e))
}
