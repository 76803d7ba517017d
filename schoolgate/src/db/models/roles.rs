//! Database models for roles and the permission catalog.

use chrono::{DateTime, Utc};

use crate::types::{PermissionId, PermissionName, RoleId, RoleName};

/// Database request for creating a role
#[derive(Debug, Clone)]
pub struct RoleCreateDBRequest {
    pub name: RoleName,
    pub description: Option<String>,
}

/// Database response for a role, with its attached permissions sorted by code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDBResponse {
    pub id: RoleId,
    pub name: RoleName,
    pub description: Option<String>,
    pub permissions: Vec<PermissionName>,
    pub created_at: DateTime<Utc>,
}

/// Database response for a permission catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDBResponse {
    pub id: PermissionId,
    pub name: PermissionName,
    pub label: String,
}
