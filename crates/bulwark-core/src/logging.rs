//! Tracing subscriber bootstrap for binaries and tests embedding Bulwark.
//!
//! The library itself only emits events; installing a subscriber is the
//! host's choice.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log directive '{directive}': {message}")]
    InvalidDirective { directive: String, message: String },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Install a fmt subscriber filtered by `RUST_LOG`, or by `default_directive`
/// (e.g. `"bulwark_core=info"`) when the variable is unset.
pub fn init(default_directive: &str) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive).map_err(|e| LoggingError::InvalidDirective {
            directive: default_directive.to_string(),
            message: e.to_string(),
        })?,
    };

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).with_target(true).finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|_| LoggingError::AlreadyInstalled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_already_installed() {
        // Either this call installs the subscriber or another test already did
        let _ = init("bulwark_core=debug");
        assert!(matches!(init("bulwark_core=debug"), Err(LoggingError::AlreadyInstalled)));
    }
}
