use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    AppState,
    api::models::users::{AccountCreate, AccountResponse, MeResponse, RoleAssignment},
    auth::{
        current_user::CurrentUser,
        password,
        permissions::{RequiresRole, role},
    },
    db::{
        errors::DbError,
        models::accounts::{AccountCreateDBRequest, AccountDBResponse},
        store::{AccountStore, RoleChangeGuard, RoleStore},
    },
    errors::{Error, Result},
    types::{AccountId, Operation, RoleName, abbrev_uuid},
};

/// The authenticated caller, with the roles and permissions resolved for this request
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Current account", body = MeResponse),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %current_user.username))]
pub async fn get_me(current_user: CurrentUser) -> Json<MeResponse> {
    Json(MeResponse::from(current_user))
}

fn validate_account_create(request: &AccountCreate) -> Result<()> {
    if request.username.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "username must not be blank".to_string(),
        });
    }
    let email = request.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(Error::BadRequest {
            message: "email is not a valid address".to_string(),
        }),
    }
}

/// Create a login account
#[utoipa::path(
    post,
    path = "/users",
    request_body = AccountCreate,
    tag = "users",
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Invalid account data"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 409, description = "Username or email already taken"),
    )
)]
#[tracing::instrument(skip_all, fields(admin = %current_user.username))]
pub async fn create_account(
    State(state): State<AppState>,
    current_user: RequiresRole<role::Administrator>,
    Json(request): Json<AccountCreate>,
) -> Result<(StatusCode, Json<AccountResponse>)> {
    validate_account_create(&request)?;
    state.config.auth.password.check_length(&request.password)?;

    let params = state.config.auth.password.argon2_params();
    let password_hash = tokio::task::spawn_blocking({
        let password = request.password;
        move || password::hash_password(&password, params)
    })
    .await
    .map_err(|e| Error::Internal {
        operation: format!("spawn password hashing task: {e}"),
    })??;

    let account = state
        .store
        .create_account(&AccountCreateDBRequest {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password_hash,
            active: true,
            role: request.role,
        })
        .await?;

    info!(account_id = %abbrev_uuid(&account.id), username = %account.username, role = ?request.role, "Created account");
    let roles = request.role.into_iter().collect();
    Ok((StatusCode::CREATED, Json(AccountResponse::new(account, roles))))
}

/// Accounts holding ADMINISTRATOR are never modified through role assignment.
fn reject_administrator(account: &AccountDBResponse, current_roles: &[RoleName]) -> crate::db::errors::Result<()> {
    if current_roles.contains(&RoleName::Administrator) {
        return Err(DbError::ProtectedEntity {
            operation: Operation::Update,
            reason: "account holds the ADMINISTRATOR role".to_string(),
            entity_type: "account".to_string(),
            entity_id: Some(account.id.to_string()),
        });
    }
    Ok(())
}

/// Replace the role of an account
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    request_body = RoleAssignment,
    tag = "users",
    params(
        ("id" = String, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Role replaced", body = AccountResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Account or role not found"),
        (status = 409, description = "Account holds the ADMINISTRATOR role"),
    )
)]
#[tracing::instrument(skip_all, fields(admin = %current_user.username, account_id = %abbrev_uuid(&id)))]
pub async fn assign_role(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    current_user: RequiresRole<role::Administrator>,
    Json(request): Json<RoleAssignment>,
) -> Result<Json<AccountResponse>> {
    let role_not_found = || Error::NotFound {
        resource: "Role".to_string(),
        id: request.role.to_string(),
    };
    if state.store.get_role_by_name(request.role).await?.is_none() {
        return Err(role_not_found());
    }

    let guard: &RoleChangeGuard = &reject_administrator;
    let account = match state.store.replace_account_role(id, request.role, guard).await {
        Ok(account) => account,
        // the role may have been deleted since the check above
        Err(DbError::NotFound) if state.store.get_account(id).await?.is_some() => return Err(role_not_found()),
        Err(DbError::NotFound) => {
            return Err(Error::NotFound {
                resource: "Account".to_string(),
                id: id.to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    info!(username = %account.username, role = %request.role, "Replaced account role");
    Ok(Json(AccountResponse::new(account, vec![request.role])))
}
