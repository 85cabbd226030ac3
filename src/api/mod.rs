//! # HTTP API
//!
//! Axum REST surface over the PKI core. Routes live in [`routes`], request
//! and response documentation in [`docs`], and the error mapping from domain
//! errors to HTTP statuses in [`error`].

pub mod docs;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use routes::{build_router, ApiState};
pub use server::start_api_server;
