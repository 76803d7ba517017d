//! API request/response models for accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::current_user::CurrentUser;
use crate::db::models::accounts::AccountDBResponse;
use crate::types::{AccountId, PermissionName, RoleName};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AccountCreate {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Role assigned on creation
    pub role: Option<RoleName>,
}

/// Body of `PUT /users/{id}/role`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleAssignment {
    pub role: RoleName,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub active: bool,
    pub roles: Vec<RoleName>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountResponse {
    pub fn new(db: AccountDBResponse, roles: Vec<RoleName>) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            active: db.active,
            roles,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// The caller as seen by the authorization gate for this request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub roles: Vec<RoleName>,
    pub permissions: Vec<PermissionName>,
}

impl From<CurrentUser> for MeResponse {
    fn from(user: CurrentUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            roles: user.authorities.roles(),
            permissions: user.authorities.permissions(),
        }
    }
}
