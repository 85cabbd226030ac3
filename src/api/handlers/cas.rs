//! CA lifecycle endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    api::{error::ApiError, routes::ApiState},
    pki::{CaRecord, Subject},
};

use super::run_blocking;

static NAME_REGEX: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").unwrap());

fn default_key_size() -> u32 {
    2048
}

/// Request to create a root CA.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateRootCaBody {
    /// Name the CA is stored under.
    #[validate(length(min = 1, max = 64, message = "name must be 1-64 characters"))]
    #[validate(regex(
        path = *NAME_REGEX,
        message = "name must contain only alphanumeric characters, hyphens, underscores, and dots"
    ))]
    pub name: String,

    /// RSA key size in bits.
    #[serde(default = "default_key_size")]
    pub size: u32,

    /// Validity in hours. Falls back to the configured root CA default.
    pub ttl: Option<i64>,

    /// Subject fields; `common_name` is mandatory.
    #[schema(value_type = Object)]
    pub subject: Subject,
}

/// Request to create an intermediate CA under an existing parent.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateIntermediateCaBody {
    /// Name the CA is stored under.
    #[validate(length(min = 1, max = 64, message = "name must be 1-64 characters"))]
    #[validate(regex(
        path = *NAME_REGEX,
        message = "name must contain only alphanumeric characters, hyphens, underscores, and dots"
    ))]
    pub name: String,

    /// RSA key size in bits.
    #[serde(default = "default_key_size")]
    pub size: u32,

    /// Validity in hours. Falls back to the configured intermediate default.
    pub ttl: Option<i64>,

    /// Subject fields; unset fields are inherited from the parent.
    #[schema(value_type = Object)]
    pub subject: Subject,
}

/// Create a self-signed root CA.
#[utoipa::path(
    post,
    path = "/api/v1/cas",
    request_body = CreateRootCaBody,
    responses(
        (status = 201, description = "CA created", body = CaRecord),
        (status = 400, description = "Invalid subject, TTL, or key size"),
        (status = 409, description = "A CA with this name already exists")
    ),
    tag = "CAs"
)]
#[instrument(skip(state, payload), fields(ca = %payload.name))]
pub async fn create_root_handler(
    State(state): State<ApiState>,
    Json(payload): Json<CreateRootCaBody>,
) -> Result<(StatusCode, Json<CaRecord>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let cas = state.cas.clone();
    let record = run_blocking(move || {
        cas.create_root(&payload.name, &payload.subject, payload.size, payload.ttl)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Create an intermediate CA signed by an existing parent.
#[utoipa::path(
    post,
    path = "/api/v1/cas/{parent}/intermediates",
    params(("parent" = String, Path, description = "Parent CA name")),
    request_body = CreateIntermediateCaBody,
    responses(
        (status = 201, description = "CA created", body = CaRecord),
        (status = 400, description = "Invalid subject, TTL, or key size"),
        (status = 404, description = "Parent CA not found"),
        (status = 409, description = "A CA with this name already exists")
    ),
    tag = "CAs"
)]
#[instrument(skip(state, payload), fields(parent = %parent, ca = %payload.name))]
pub async fn create_intermediate_handler(
    State(state): State<ApiState>,
    Path(parent): Path<String>,
    Json(payload): Json<CreateIntermediateCaBody>,
) -> Result<(StatusCode, Json<CaRecord>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let cas = state.cas.clone();
    let record = run_blocking(move || {
        cas.create_intermediate(
            &parent,
            &payload.name,
            &payload.subject,
            payload.size,
            payload.ttl,
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// List the names of every stored CA.
#[utoipa::path(
    get,
    path = "/api/v1/cas",
    responses((status = 200, description = "CA names", body = Vec<String>)),
    tag = "CAs"
)]
#[instrument(skip(state))]
pub async fn list_cas_handler(
    State(state): State<ApiState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let cas = state.cas.clone();
    let names = run_blocking(move || cas.list()).await?;
    Ok(Json(names))
}

/// A CA's certificate and chain.
#[utoipa::path(
    get,
    path = "/api/v1/cas/{ca}",
    params(("ca" = String, Path, description = "CA name")),
    responses(
        (status = 200, description = "CA certificate and chain", body = CaRecord),
        (status = 404, description = "CA not found")
    ),
    tag = "CAs"
)]
#[instrument(skip(state), fields(ca = %ca))]
pub async fn get_ca_handler(
    State(state): State<ApiState>,
    Path(ca): Path<String>,
) -> Result<Json<CaRecord>, ApiError> {
    let cas = state.cas.clone();
    let record = run_blocking(move || cas.get(&ca)).await?;
    Ok(Json(record))
}

/// Delete a CA's key material and certificate.
#[utoipa::path(
    delete,
    path = "/api/v1/cas/{ca}",
    params(("ca" = String, Path, description = "CA name")),
    responses(
        (status = 204, description = "CA deleted"),
        (status = 404, description = "CA not found")
    ),
    tag = "CAs"
)]
#[instrument(skip(state), fields(ca = %ca))]
pub async fn delete_ca_handler(
    State(state): State<ApiState>,
    Path(ca): Path<String>,
) -> Result<StatusCode, ApiError> {
    let cas = state.cas.clone();
    run_blocking(move || cas.delete(&ca)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A CA's certificate PEM.
#[utoipa::path(
    get,
    path = "/api/v1/cas/{ca}/certificate",
    params(("ca" = String, Path, description = "CA name")),
    responses(
        (status = 200, description = "Certificate PEM", body = String),
        (status = 404, description = "CA not found")
    ),
    tag = "CAs"
)]
#[instrument(skip(state), fields(ca = %ca))]
pub async fn get_ca_certificate_handler(
    State(state): State<ApiState>,
    Path(ca): Path<String>,
) -> Result<String, ApiError> {
    let cas = state.cas.clone();
    let pem = run_blocking(move || cas.certificate(&ca)).await?;
    Ok(pem)
}

/// A CA's chain up to the root, the CA itself first.
#[utoipa::path(
    get,
    path = "/api/v1/cas/{ca}/chain",
    params(("ca" = String, Path, description = "CA name")),
    responses(
        (status = 200, description = "PEM bundle", body = String),
        (status = 404, description = "CA not found")
    ),
    tag = "CAs"
)]
#[instrument(skip(state), fields(ca = %ca))]
pub async fn get_ca_chain_handler(
    State(state): State<ApiState>,
    Path(ca): Path<String>,
) -> Result<String, ApiError> {
    let cas = state.cas.clone();
    let chain = run_blocking(move || cas.chain(&ca)).await?;
    Ok(chain)
}
