//! # Observability
//!
//! Structured logging for the Palisade service through the tracing ecosystem.
//! The log level comes from `RUST_LOG` (falling back to `PALISADE_LOG_LEVEL`,
//! then `info`); `PALISADE_LOG_FORMAT=json` switches to JSON output for log
//! shippers.

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::errors::{Error, Result};

/// Initialize the global tracing subscriber. Call once at startup.
pub fn init_logging() -> Result<()> {
    let default_level =
        std::env::var("PALISADE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&default_level))
        .map_err(|e| Error::config(format!("Invalid log filter: {}", e)))?;

    let json = std::env::var("PALISADE_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let builder = fmt().with_env_filter(filter).with_target(true);
    let result = if json { builder.json().try_init() } else { builder.try_init() };

    result.map_err(|e| Error::config(format!("Failed to initialize logging: {}", e)))
}

/// Log the effective configuration at startup.
pub fn log_config_info(config: &AppConfig) {
    info!(
        server_address = %config.server.bind_address(),
        secrets_path = %config.storage.secrets_path.display(),
        certs_path = %config.storage.certs_path.display(),
        ca_max_ttl = config.ttl.ca_max_ttl,
        cert_max_ttl = config.ttl.cert_max_ttl,
        "Palisade certificate authority configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_info() {
        let config = AppConfig::default();

        // This should not panic
        log_config_info(&config);
    }
}
