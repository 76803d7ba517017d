use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    AppState,
    api::models::roles::{PermissionResponse, RoleCreate, RoleResponse, RoleUpdate},
    auth::permissions::{RequiresPermission, permission},
    db::{
        errors::DbError,
        models::roles::RoleCreateDBRequest,
        store::{PermissionStore, RoleStore},
    },
    errors::{Error, Result},
    types::{PermissionName, RoleId, RoleName},
};

fn role_not_found(id: RoleId) -> Error {
    Error::NotFound {
        resource: "Role".to_string(),
        id: id.to_string(),
    }
}

fn parse_permission(name: &str) -> Result<PermissionName> {
    name.parse().map_err(|e: crate::types::UnknownName| Error::BadRequest { message: e.to_string() })
}

/// List the permission catalog
#[utoipa::path(
    get,
    path = "/permissions",
    tag = "roles",
    responses(
        (status = 200, description = "Permission catalog", body = [PermissionResponse]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing GET_ROLES"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username))]
pub async fn list_permissions(
    State(state): State<AppState>,
    current_user: RequiresPermission<permission::GetRoles>,
) -> Result<Json<Vec<PermissionResponse>>> {
    let permissions = state.store.list_permissions().await?;
    Ok(Json(permissions.into_iter().map(PermissionResponse::from).collect()))
}

/// List roles with their permissions
#[utoipa::path(
    get,
    path = "/roles",
    tag = "roles",
    responses(
        (status = 200, description = "All roles", body = [RoleResponse]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing GET_ROLES"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username))]
pub async fn list_roles(
    State(state): State<AppState>,
    current_user: RequiresPermission<permission::GetRoles>,
) -> Result<Json<Vec<RoleResponse>>> {
    let roles = state.store.list_roles().await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// Create a role
#[utoipa::path(
    post,
    path = "/roles",
    request_body = RoleCreate,
    tag = "roles",
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 400, description = "Name is not a known role"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing CREATE_ROLE"),
        (status = 409, description = "Role already exists"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username))]
pub async fn create_role(
    State(state): State<AppState>,
    current_user: RequiresPermission<permission::CreateRole>,
    Json(request): Json<RoleCreate>,
) -> Result<(StatusCode, Json<RoleResponse>)> {
    let name: RoleName = request
        .name
        .trim()
        .parse()
        .map_err(|e: crate::types::UnknownName| Error::BadRequest { message: e.to_string() })?;

    let role = state
        .store
        .create_role(&RoleCreateDBRequest {
            name,
            description: request.description.or_else(|| Some(name.default_description().to_string())),
        })
        .await?;

    info!(role = %role.name, "Created role");
    Ok((StatusCode::CREATED, Json(role.into())))
}

/// Get a role
#[utoipa::path(
    get,
    path = "/roles/{id}",
    tag = "roles",
    params(
        ("id" = String, Path, description = "Role ID")
    ),
    responses(
        (status = 200, description = "Role", body = RoleResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing GET_ROLE"),
        (status = 404, description = "Role not found"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username, role_id = %id))]
pub async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    current_user: RequiresPermission<permission::GetRole>,
) -> Result<Json<RoleResponse>> {
    let role = state.store.get_role(id).await?.ok_or_else(|| role_not_found(id))?;
    Ok(Json(role.into()))
}

/// Update a role's description. Names cannot be changed.
#[utoipa::path(
    put,
    path = "/roles/{id}",
    request_body = RoleUpdate,
    tag = "roles",
    params(
        ("id" = String, Path, description = "Role ID")
    ),
    responses(
        (status = 200, description = "Role updated", body = RoleResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing UPDATE_ROLE"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Attempt to rename the role"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username, role_id = %id))]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    current_user: RequiresPermission<permission::UpdateRole>,
    Json(request): Json<RoleUpdate>,
) -> Result<Json<RoleResponse>> {
    let existing = state.store.get_role(id).await?.ok_or_else(|| role_not_found(id))?;

    if let Some(name) = request.name.as_deref().map(str::trim)
        && name != existing.name.as_str()
    {
        return Err(Error::Conflict {
            message: format!("Role names cannot be changed ({} -> {name})", existing.name),
        });
    }

    let role = state
        .store
        .update_role_description(id, request.description)
        .await?
        .ok_or_else(|| role_not_found(id))?;

    info!(role = %role.name, "Updated role description");
    Ok(Json(role.into()))
}

/// Delete a role no account holds
#[utoipa::path(
    delete,
    path = "/roles/{id}",
    tag = "roles",
    params(
        ("id" = String, Path, description = "Role ID")
    ),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing DELETE_ROLE"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role is held by at least one account"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username, role_id = %id))]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    current_user: RequiresPermission<permission::DeleteRole>,
) -> Result<StatusCode> {
    if !state.store.delete_role(id).await? {
        return Err(role_not_found(id));
    }
    info!("Deleted role");
    Ok(StatusCode::NO_CONTENT)
}

/// Attach a permission to a role
#[utoipa::path(
    post,
    path = "/roles/{id}/permissions/{name}",
    tag = "roles",
    params(
        ("id" = String, Path, description = "Role ID"),
        ("name" = String, Path, description = "Permission code, e.g. GET_PERSON")
    ),
    responses(
        (status = 200, description = "Role with the permission attached", body = RoleResponse),
        (status = 400, description = "Unknown permission code"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing ASSIGN_ROLE_PERMISSION"),
        (status = 404, description = "Role or permission not found"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username, role_id = %id, permission = %name))]
pub async fn add_role_permission(
    State(state): State<AppState>,
    Path((id, name)): Path<(RoleId, String)>,
    current_user: RequiresPermission<permission::AssignRolePermission>,
) -> Result<Json<RoleResponse>> {
    let permission = parse_permission(&name)?;
    if state.store.get_permission(permission).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Permission".to_string(),
            id: name,
        });
    }

    let role = state.store.add_role_permission(id, permission).await.map_err(|e| match e {
        DbError::NotFound => role_not_found(id),
        other => Error::Database(other),
    })?;

    info!(role = %role.name, %permission, "Attached permission to role");
    Ok(Json(role.into()))
}

/// Detach a permission from a role
#[utoipa::path(
    delete,
    path = "/roles/{id}/permissions/{name}",
    tag = "roles",
    params(
        ("id" = String, Path, description = "Role ID"),
        ("name" = String, Path, description = "Permission code, e.g. GET_PERSON")
    ),
    responses(
        (status = 200, description = "Role with the permission detached", body = RoleResponse),
        (status = 400, description = "Unknown permission code"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing REMOVE_ROLE_PERMISSION"),
        (status = 404, description = "Role or permission not found"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username, role_id = %id, permission = %name))]
pub async fn remove_role_permission(
    State(state): State<AppState>,
    Path((id, name)): Path<(RoleId, String)>,
    current_user: RequiresPermission<permission::RemoveRolePermission>,
) -> Result<Json<RoleResponse>> {
    let permission = parse_permission(&name)?;
    if state.store.get_permission(permission).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Permission".to_string(),
            id: name,
        });
    }

    let role = state.store.remove_role_permission(id, permission).await.map_err(|e| match e {
        DbError::NotFound => role_not_found(id),
        other => Error::Database(other),
    })?;

    info!(role = %role.name, %permission, "Detached permission from role");
    Ok(Json(role.into()))
}
