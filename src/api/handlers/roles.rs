//! Role CRUD endpoints under a CA.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use crate::{
    api::{error::ApiError, routes::ApiState},
    pki::Role,
};

use super::run_blocking;

/// Create or update a role. Fields present in the body overwrite the stored
/// record field by field.
#[utoipa::path(
    put,
    path = "/api/v1/cas/{ca}/roles/{role}",
    params(
        ("ca" = String, Path, description = "CA name"),
        ("role" = String, Path, description = "Role name")
    ),
    request_body = Role,
    responses(
        (status = 200, description = "Role updated", body = Role),
        (status = 201, description = "Role created", body = Role),
        (status = 404, description = "CA not found")
    ),
    tag = "Roles"
)]
#[instrument(skip(state, payload), fields(ca = %ca, role = %role))]
pub async fn put_role_handler(
    State(state): State<ApiState>,
    Path((ca, role)): Path<(String, String)>,
    Json(payload): Json<Role>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    let roles = state.roles.clone();
    let (record, created) = run_blocking(move || roles.put(&ca, &role, payload)).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(record)))
}

/// Fetch a role.
#[utoipa::path(
    get,
    path = "/api/v1/cas/{ca}/roles/{role}",
    params(
        ("ca" = String, Path, description = "CA name"),
        ("role" = String, Path, description = "Role name")
    ),
    responses(
        (status = 200, description = "Role record", body = Role),
        (status = 404, description = "CA or role not found")
    ),
    tag = "Roles"
)]
#[instrument(skip(state), fields(ca = %ca, role = %role))]
pub async fn get_role_handler(
    State(state): State<ApiState>,
    Path((ca, role)): Path<(String, String)>,
) -> Result<Json<Role>, ApiError> {
    let roles = state.roles.clone();
    let record = run_blocking(move || roles.get(&ca, &role)).await?;
    Ok(Json(record))
}

/// List role names under a CA.
#[utoipa::path(
    get,
    path = "/api/v1/cas/{ca}/roles",
    params(("ca" = String, Path, description = "CA name")),
    responses(
        (status = 200, description = "Role names", body = Vec<String>),
        (status = 404, description = "CA not found")
    ),
    tag = "Roles"
)]
#[instrument(skip(state), fields(ca = %ca))]
pub async fn list_roles_handler(
    State(state): State<ApiState>,
    Path(ca): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let roles = state.roles.clone();
    let names = run_blocking(move || roles.list(&ca)).await?;
    Ok(Json(names))
}

/// Delete a role.
#[utoipa::path(
    delete,
    path = "/api/v1/cas/{ca}/roles/{role}",
    params(
        ("ca" = String, Path, description = "CA name"),
        ("role" = String, Path, description = "Role name")
    ),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "CA or role not found")
    ),
    tag = "Roles"
)]
#[instrument(skip(state), fields(ca = %ca, role = %role))]
pub async fn delete_role_handler(
    State(state): State<ApiState>,
    Path((ca, role)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let roles = state.roles.clone();
    run_blocking(move || roles.delete(&ca, &role)).await?;
    Ok(StatusCode::NO_CONTENT)
}
