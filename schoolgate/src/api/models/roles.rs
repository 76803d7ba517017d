//! API request/response models for roles and the permission catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::roles::{PermissionDBResponse, RoleDBResponse};
use crate::types::{PermissionId, PermissionName, RoleId, RoleName};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RoleCreate {
    /// One of ADMINISTRATOR, TEACHER, STUDENT, GUARDIAN
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RoleUpdate {
    /// Role names are immutable; when present this must match the current name
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoleId,
    pub name: RoleName,
    pub description: Option<String>,
    pub permissions: Vec<PermissionName>,
    pub created_at: DateTime<Utc>,
}

impl From<RoleDBResponse> for RoleResponse {
    fn from(db: RoleDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            permissions: db.permissions,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PermissionId,
    pub name: PermissionName,
    pub label: String,
}

impl From<PermissionDBResponse> for PermissionResponse {
    fn from(db: PermissionDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            label: db.label,
        }
    }
}
