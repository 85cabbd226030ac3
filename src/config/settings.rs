//! # Configuration Settings
//!
//! Defines the configuration structure for the Palisade service. Every value
//! can be supplied through the environment (`PALISADE_*` variables); defaults
//! match a single-operator deployment writing under `/secrets` and `/certs`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{Error, Result};

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| Error::config(format!("{} must be a valid number, got '{}'", name, raw))),
        None => Ok(default),
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// HTTP server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Blob store locations
    #[validate(nested)]
    pub storage: StorageConfig,

    /// Certificate TTL ceilings and defaults
    #[validate(nested)]
    pub ttl: TtlConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            server: ServerConfig::from_env()?,
            storage: StorageConfig::from_env(),
            ttl: TtlConfig::from_env()?,
        };

        config.validate_all()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate_all(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.ttl.validate_ceilings()?;

        if self.storage.secrets_path == self.storage.certs_path {
            return Err(Error::validation(
                "Secret store and certificate store cannot share a directory",
            ));
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// Server bind address
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    /// Server port
    #[validate(range(min = 1, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080, timeout_seconds: 30 }
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: env_var("PALISADE_HOST").unwrap_or(defaults.host),
            port: env_parse("PALISADE_PORT", defaults.port)?,
            timeout_seconds: env_parse("PALISADE_TIMEOUT_SECONDS", defaults.timeout_seconds)?,
        })
    }

    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Filesystem locations backing the secret store and the certificate store
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    /// Root directory for private keys and parent pointers
    pub secrets_path: PathBuf,

    /// Root directory for certificates, roles and client records
    pub certs_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { secrets_path: PathBuf::from("/secrets"), certs_path: PathBuf::from("/certs") }
    }
}

impl StorageConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            secrets_path: env_var("PALISADE_SECRETS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.secrets_path),
            certs_path: env_var("PALISADE_CERTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.certs_path),
        }
    }
}

/// TTL ceilings and defaults, all in whole hours
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TtlConfig {
    /// Default validity for root CA certificates (10 years)
    #[validate(range(min = 1))]
    pub ca_root_ttl: i64,

    /// Default validity for intermediate CA certificates (5 years)
    #[validate(range(min = 1))]
    pub ca_intermediate_ttl: i64,

    /// Ceiling for any CA certificate (20 years)
    #[validate(range(min = 1))]
    pub ca_max_ttl: i64,

    /// Default validity for leaf certificates (1 month)
    #[validate(range(min = 1))]
    pub cert_default_ttl: i64,

    /// Ceiling for leaf certificates when the role does not set one (13 months)
    #[validate(range(min = 1))]
    pub cert_max_ttl: i64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            ca_root_ttl: 87_600,
            ca_intermediate_ttl: 43_800,
            ca_max_ttl: 175_200,
            cert_default_ttl: 720,
            cert_max_ttl: 9_490,
        }
    }
}

impl TtlConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            ca_root_ttl: env_parse("PALISADE_CA_ROOT_TTL", defaults.ca_root_ttl)?,
            ca_intermediate_ttl: env_parse(
                "PALISADE_CA_INTERMEDIATE_TTL",
                defaults.ca_intermediate_ttl,
            )?,
            ca_max_ttl: env_parse("PALISADE_CA_MAX_TTL", defaults.ca_max_ttl)?,
            cert_default_ttl: env_parse("PALISADE_CERT_DEFAULT_TTL", defaults.cert_default_ttl)?,
            cert_max_ttl: env_parse("PALISADE_CERT_MAX_TTL", defaults.cert_max_ttl)?,
        })
    }

    /// Defaults must stay within their ceilings or every create would fail
    fn validate_ceilings(&self) -> Result<()> {
        if self.ca_root_ttl > self.ca_max_ttl {
            return Err(Error::validation("CA root TTL cannot exceed the CA ceiling TTL"));
        }
        if self.ca_intermediate_ttl > self.ca_max_ttl {
            return Err(Error::validation("CA intermediate TTL cannot exceed the CA ceiling TTL"));
        }
        if self.cert_default_ttl > self.cert_max_ttl {
            return Err(Error::validation(
                "Certificate default TTL cannot exceed the certificate ceiling TTL",
            ));
        }
        Ok(())
    }
}
