//! Issuance, CSR signing and certificate inspection endpoints.

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
    pki::{CertificateInfo, IssuedCertificate, Subject},
};

use super::run_blocking;

fn default_key_size() -> u32 {
    2048
}

/// Request to issue a certificate with a server-generated key pair.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct IssueCertificateBody {
    /// Subject fields; `common_name` is mandatory and checked against the
    /// role's policy.
    #[schema(value_type = Object)]
    pub subject: Subject,

    /// RSA key size in bits.
    #[serde(default = "default_key_size")]
    pub size: u32,

    /// Validity in hours, bounded by the role's ceiling.
    pub ttl: Option<i64>,

    /// Additional DNS names, each checked against the role's policy.
    #[serde(default)]
    pub alt_domains: Vec<String>,

    /// Additional IP addresses.
    #[serde(default)]
    pub alt_ips: Vec<String>,
}

/// Request to counter-sign a CSR.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct SignCertificateBody {
    /// PEM-encoded certificate signing request.
    #[validate(length(min = 1, message = "csr cannot be empty"))]
    pub csr: String,

    /// Validity in hours, bounded by the role's ceiling.
    pub ttl: Option<i64>,
}

/// Issue a certificate under a CA and role. The private key is generated
/// server-side and returned exactly once.
#[utoipa::path(
    post,
    path = "/api/v1/cas/{ca}/roles/{role}/issue",
    params(
        ("ca" = String, Path, description = "CA name"),
        ("role" = String, Path, description = "Role name")
    ),
    request_body = IssueCertificateBody,
    responses(
        (status = 201, description = "Certificate issued", body = IssuedCertificate),
        (status = 400, description = "Policy or TTL violation"),
        (status = 404, description = "CA or role not found")
    ),
    tag = "Certificates"
)]
#[instrument(skip(state, payload), fields(ca = %ca, role = %role))]
pub async fn issue_handler(
    State(state): State<ApiState>,
    Path((ca, role)): Path<(String, String)>,
    Json(payload): Json<IssueCertificateBody>,
) -> Result<(StatusCode, Json<IssuedCertificate>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let issuer = state.issuer.clone();
    let issued = run_blocking(move || {
        issuer.issue(
            &ca,
            &role,
            &payload.subject,
            payload.size,
            payload.ttl,
            &payload.alt_domains,
            &payload.alt_ips,
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// Counter-sign a CSR under a CA and role. The CSR's subject and public key
/// are used as submitted.
#[utoipa::path(
    post,
    path = "/api/v1/cas/{ca}/roles/{role}/sign",
    params(
        ("ca" = String, Path, description = "CA name"),
        ("role" = String, Path, description = "Role name")
    ),
    request_body = SignCertificateBody,
    responses(
        (status = 201, description = "Certificate signed", body = IssuedCertificate),
        (status = 400, description = "Malformed CSR, policy or TTL violation"),
        (status = 404, description = "CA or role not found")
    ),
    tag = "Certificates"
)]
#[instrument(skip(state, payload), fields(ca = %ca, role = %role))]
pub async fn sign_handler(
    State(state): State<ApiState>,
    Path((ca, role)): Path<(String, String)>,
    Json(payload): Json<SignCertificateBody>,
) -> Result<(StatusCode, Json<IssuedCertificate>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let issuer = state.issuer.clone();
    let issued =
        run_blocking(move || issuer.sign(&ca, &role, &payload.csr, payload.ttl)).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// Decoded attributes of a stored certificate, looked up by serial.
#[utoipa::path(
    get,
    path = "/api/v1/certificates/{serial}",
    params(("serial" = String, Path, description = "Certificate serial number")),
    responses(
        (status = 200, description = "Certificate info", body = CertificateInfo),
        (status = 404, description = "Certificate not found")
    ),
    tag = "Certificates"
)]
#[instrument(skip(state), fields(serial = %serial))]
pub async fn get_certificate_info_handler(
    State(state): State<ApiState>,
    Path(serial): Path<String>,
) -> Result<Json<CertificateInfo>, ApiError> {
    let issuer = state.issuer.clone();
    let details = run_blocking(move || issuer.info(&serial)).await?;
    Ok(Json(details))
}
