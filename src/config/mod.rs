//! # Configuration Management
//!
//! Environment-driven configuration for the Palisade service.

mod settings;

pub use settings::{AppConfig, ServerConfig, StorageConfig, TtlConfig};
