//! Database models for login accounts.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{AccountId, PermissionName, RoleName};

/// Database request for creating a new account
#[derive(Debug, Clone)]
pub struct AccountCreateDBRequest {
    pub username: String,
    pub email: String,
    /// Already hashed; never empty
    pub password_hash: String,
    pub active: bool,
    /// Initial role, if any
    pub role: Option<RoleName>,
}

/// Database response for an account
#[derive(Debug, Clone, FromRow)]
pub struct AccountDBResponse {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A role held by an account together with the permissions currently attached to that role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role: RoleName,
    pub permissions: Vec<PermissionName>,
}
