//! HTTP handlers, one module per resource.
//!
//! Key generation and signing are CPU-heavy and the stores do blocking I/O,
//! so every handler hops onto the blocking pool through [`run_blocking`]
//! with a cheap clone of the component it needs.

pub mod cas;
pub mod certificates;
pub mod clients;
pub mod roles;

use super::error::ApiError;

/// Run a PKI operation on the blocking pool and map its error.
pub(crate) async fn run_blocking<T, F>(operation: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::errors::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}
