//! # Palisade
//!
//! Palisade is a private certificate-authority management service: it keeps a
//! hierarchy of root and intermediate CAs on disk, enforces role-based
//! issuance policy, and hands out certificates over a REST API.
//!
//! ## Architecture
//!
//! ```text
//! REST API Layer → PKI Core → Blob Stores (secrets / certificates)
//!      ↓               ↓
//! Error Mapping   Observability
//! ```
//!
//! ## Core Components
//!
//! - **REST API**: Axum-based HTTP server exposing CA, role, client and
//!   certificate operations
//! - **PKI Core**: CA hierarchy, subject policy, trust chains and issuance
//!   built on rcgen and x509-parser
//! - **Persistence Layer**: filesystem-backed blob stores behind a trait,
//!   one for private material and one for public records
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use palisade::{api::start_api_server, config::AppConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_env()?;
//!     start_api_server(config).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod errors;
pub mod observability;
pub mod pki;
pub mod storage;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
