//! Client, client-role and client-certificate endpoints.

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
    pki::{Client, ClientIssued, Role, Subject},
};

use crate::pki::issuer::CertificateRecord;

use super::run_blocking;

/// Request to issue a certificate for a client. The key size comes from the
/// client role.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IssueClientCertificateBody {
    /// Subject fields; `common_name` is mandatory unless supplied by the
    /// role's subject template.
    #[schema(value_type = Object)]
    pub subject: Subject,

    /// Validity in hours, bounded by the role's ceiling.
    pub ttl: Option<i64>,
}

/// Request to counter-sign a CSR for a client.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct SignClientCertificateBody {
    /// PEM-encoded certificate signing request.
    #[validate(length(min = 1, message = "csr cannot be empty"))]
    pub csr: String,

    /// Validity in hours, bounded by the role's ceiling.
    pub ttl: Option<i64>,

    /// Replaces the CSR's common name when set.
    pub common_name: Option<String>,
}

/// Create or update a client. The effective record must name an existing CA.
#[utoipa::path(
    put,
    path = "/api/v1/clients/{client}",
    params(("client" = String, Path, description = "Client name")),
    request_body = Client,
    responses(
        (status = 200, description = "Client updated", body = Client),
        (status = 201, description = "Client created", body = Client),
        (status = 400, description = "Record is missing a CA"),
        (status = 404, description = "Referenced CA not found")
    ),
    tag = "Clients"
)]
#[instrument(skip(state, payload), fields(client = %client))]
pub async fn put_client_handler(
    State(state): State<ApiState>,
    Path(client): Path<String>,
    Json(payload): Json<Client>,
) -> Result<(StatusCode, Json<Client>), ApiError> {
    let clients = state.clients.clone();
    let (record, created) = run_blocking(move || clients.put(&client, payload)).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(record)))
}

/// Fetch a client record.
#[utoipa::path(
    get,
    path = "/api/v1/clients/{client}",
    params(("client" = String, Path, description = "Client name")),
    responses(
        (status = 200, description = "Client record", body = Client),
        (status = 404, description = "Client not found")
    ),
    tag = "Clients"
)]
#[instrument(skip(state), fields(client = %client))]
pub async fn get_client_handler(
    State(state): State<ApiState>,
    Path(client): Path<String>,
) -> Result<Json<Client>, ApiError> {
    let clients = state.clients.clone();
    let record = run_blocking(move || clients.get(&client)).await?;
    Ok(Json(record))
}

/// Delete a client with its roles and certificates.
#[utoipa::path(
    delete,
    path = "/api/v1/clients/{client}",
    params(("client" = String, Path, description = "Client name")),
    responses(
        (status = 204, description = "Client deleted"),
        (status = 404, description = "Client not found")
    ),
    tag = "Clients"
)]
#[instrument(skip(state), fields(client = %client))]
pub async fn delete_client_handler(
    State(state): State<ApiState>,
    Path(client): Path<String>,
) -> Result<StatusCode, ApiError> {
    let clients = state.clients.clone();
    run_blocking(move || clients.delete(&client)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List client names.
#[utoipa::path(
    get,
    path = "/api/v1/clients",
    responses((status = 200, description = "Client names", body = Vec<String>)),
    tag = "Clients"
)]
#[instrument(skip(state))]
pub async fn list_clients_handler(
    State(state): State<ApiState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let clients = state.clients.clone();
    let names = run_blocking(move || clients.list()).await?;
    Ok(Json(names))
}

/// Create or update a role scoped to a client.
#[utoipa::path(
    put,
    path = "/api/v1/clients/{client}/roles/{role}",
    params(
        ("client" = String, Path, description = "Client name"),
        ("role" = String, Path, description = "Role name")
    ),
    request_body = Role,
    responses(
        (status = 200, description = "Role updated", body = Role),
        (status = 201, description = "Role created", body = Role),
        (status = 404, description = "Client not found")
    ),
    tag = "Clients"
)]
#[instrument(skip(state, payload), fields(client = %client, role = %role))]
pub async fn put_client_role_handler(
    State(state): State<ApiState>,
    Path((client, role)): Path<(String, String)>,
    Json(payload): Json<Role>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    let clients = state.clients.clone();
    let (record, created) = run_blocking(move || clients.put_role(&client, &role, payload)).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(record)))
}

/// Fetch a client role.
#[utoipa::path(
    get,
    path = "/api/v1/clients/{client}/roles/{role}",
    params(
        ("client" = String, Path, description = "Client name"),
        ("role" = String, Path, description = "Role name")
    ),
    responses(
        (status = 200, description = "Role record", body = Role),
        (status = 404, description = "Client or role not found")
    ),
    tag = "Clients"
)]
#[instrument(skip(state), fields(client = %client, role = %role))]
pub async fn get_client_role_handler(
    State(state): State<ApiState>,
    Path((client, role)): Path<(String, String)>,
) -> Result<Json<Role>, ApiError> {
    let clients = state.clients.clone();
    let record = run_blocking(move || clients.get_role(&client, &role)).await?;
    Ok(Json(record))
}

/// List role names under a client.
#[utoipa::path(
    get,
    path = "/api/v1/clients/{client}/roles",
    params(("client" = String, Path, description = "Client name")),
    responses(
        (status = 200, description = "Role names", body = Vec<String>),
        (status = 404, description = "Client not found")
    ),
    tag = "Clients"
)]
#[instrument(skip(state), fields(client = %client))]
pub async fn list_client_roles_handler(
    State(state): State<ApiState>,
    Path(client): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let clients = state.clients.clone();
    let names = run_blocking(move || clients.list_roles(&client)).await?;
    Ok(Json(names))
}

/// Delete a client role.
#[utoipa::path(
    delete,
    path = "/api/v1/clients/{client}/roles/{role}",
    params(
        ("client" = String, Path, description = "Client name"),
        ("role" = String, Path, description = "Role name")
    ),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Client or role not found")
    ),
    tag = "Clients"
)]
#[instrument(skip(state), fields(client = %client, role = %role))]
pub async fn delete_client_role_handler(
    State(state): State<ApiState>,
    Path((client, role)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let clients = state.clients.clone();
    run_blocking(move || clients.delete_role(&client, &role)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Issue a certificate for a client under one of its roles.
#[utoipa::path(
    post,
    path = "/api/v1/clients/{client}/roles/{role}/issue",
    params(
        ("client" = String, Path, description = "Client name"),
        ("role" = String, Path, description = "Role name")
    ),
    request_body = IssueClientCertificateBody,
    responses(
        (status = 201, description = "Certificate issued", body = ClientIssued),
        (status = 400, description = "Policy or TTL violation, or role lacks a key size"),
        (status = 404, description = "Client, role or CA not found")
    ),
    tag = "Clients"
)]
#[instrument(skip(state, payload), fields(client = %client, role = %role))]
pub async fn issue_client_handler(
    State(state): State<ApiState>,
    Path((client, role)): Path<(String, String)>,
    Json(payload): Json<IssueClientCertificateBody>,
) -> Result<(StatusCode, Json<ClientIssued>), ApiError> {
    let clients = state.clients.clone();
    let issued =
        run_blocking(move || clients.issue(&client, &role, &payload.subject, payload.ttl)).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// Counter-sign a CSR for a client under one of its roles.
#[utoipa::path(
    post,
    path = "/api/v1/clients/{client}/roles/{role}/sign",
    params(
        ("client" = String, Path, description = "Client name"),
        ("role" = String, Path, description = "Role name")
    ),
    request_body = SignClientCertificateBody,
    responses(
        (status = 201, description = "Certificate signed", body = ClientIssued),
        (status = 400, description = "Malformed CSR, policy or TTL violation"),
        (status = 404, description = "Client, role or CA not found")
    ),
    tag = "Clients"
)]
#[instrument(skip(state, payload), fields(client = %client, role = %role))]
pub async fn sign_client_handler(
    State(state): State<ApiState>,
    Path((client, role)): Path<(String, String)>,
    Json(payload): Json<SignClientCertificateBody>,
) -> Result<(StatusCode, Json<ClientIssued>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let clients = state.clients.clone();
    let issued = run_blocking(move || {
        clients.sign(&client, &role, &payload.csr, payload.ttl, payload.common_name.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// A stored client certificate with its chain.
#[utoipa::path(
    get,
    path = "/api/v1/clients/{client}/certificates/{cn}",
    params(
        ("client" = String, Path, description = "Client name"),
        ("cn" = String, Path, description = "Certificate common name")
    ),
    responses(
        (status = 200, description = "Certificate and chain", body = CertificateRecord),
        (status = 404, description = "Client or certificate not found")
    ),
    tag = "Clients"
)]
#[instrument(skip(state), fields(client = %client, cn = %cn))]
pub async fn get_client_certificate_handler(
    State(state): State<ApiState>,
    Path((client, cn)): Path<(String, String)>,
) -> Result<Json<CertificateRecord>, ApiError> {
    let clients = state.clients.clone();
    let record = run_blocking(move || clients.get_certificate(&client, &cn)).await?;
    Ok(Json(record))
}

/// Delete a stored client certificate.
#[utoipa::path(
    delete,
    path = "/api/v1/clients/{client}/certificates/{cn}",
    params(
        ("client" = String, Path, description = "Client name"),
        ("cn" = String, Path, description = "Certificate common name")
    ),
    responses(
        (status = 204, description = "Certificate deleted"),
        (status = 404, description = "Client or certificate not found")
    ),
    tag = "Clients"
)]
#[instrument(skip(state), fields(client = %client, cn = %cn))]
pub async fn delete_client_certificate_handler(
    State(state): State<ApiState>,
    Path((client, cn)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let clients = state.clients.clone();
    run_blocking(move || clients.delete_certificate(&client, &cn)).await?;
    Ok(StatusCode::NO_CONTENT)
}
