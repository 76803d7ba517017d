//! Common type definitions for accounts, roles and permissions.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`AccountId`]: Login account identifier
//! - [`RoleId`]: Role identifier
//! - [`PermissionId`]: Permission catalog entry identifier
//! - [`PersonId`]: Person record identifier, shared by the student record extending it
//!
//! # Closed name sets
//!
//! Role and permission names are stored as text but never handled as free-form strings.
//! [`RoleName`] and [`PermissionName`] are parsed at the store boundary and rejected when
//! they fall outside the known set.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type AccountId = Uuid;
pub type RoleId = Uuid;
pub type PermissionId = Uuid;
pub type PersonId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// A name that is not part of a closed name set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

// Operations that can be applied to a stored entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// The fixed set of role names an account can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleName {
    Administrator,
    Teacher,
    Student,
    Guardian,
}

impl RoleName {
    pub const ALL: [RoleName; 4] = [RoleName::Administrator, RoleName::Teacher, RoleName::Student, RoleName::Guardian];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Administrator => "ADMINISTRATOR",
            RoleName::Teacher => "TEACHER",
            RoleName::Student => "STUDENT",
            RoleName::Guardian => "GUARDIAN",
        }
    }

    /// Description stored when the role row is first created.
    pub fn default_description(&self) -> &'static str {
        match self {
            RoleName::Administrator => "Full administrative access",
            RoleName::Teacher => "Teaching staff",
            RoleName::Student => "Enrolled student",
            RoleName::Guardian => "Parent or legal guardian of a student",
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleName::ALL.into_iter().find(|r| r.as_str() == s).ok_or_else(|| UnknownName {
            kind: "role",
            value: s.to_string(),
        })
    }
}

/// The permission catalog. Each code is the finest-grained capability checked at an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionName {
    GetPersons,
    GetPerson,
    CreatePerson,
    UpdatePerson,
    DeletePerson,
    GetRoles,
    GetRole,
    CreateRole,
    UpdateRole,
    DeleteRole,
    AssignRolePermission,
    RemoveRolePermission,
}

impl PermissionName {
    pub const ALL: [PermissionName; 12] = [
        PermissionName::GetPersons,
        PermissionName::GetPerson,
        PermissionName::CreatePerson,
        PermissionName::UpdatePerson,
        PermissionName::DeletePerson,
        PermissionName::GetRoles,
        PermissionName::GetRole,
        PermissionName::CreateRole,
        PermissionName::UpdateRole,
        PermissionName::DeleteRole,
        PermissionName::AssignRolePermission,
        PermissionName::RemoveRolePermission,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionName::GetPersons => "GET_PERSONS",
            PermissionName::GetPerson => "GET_PERSON",
            PermissionName::CreatePerson => "CREATE_PERSON",
            PermissionName::UpdatePerson => "UPDATE_PERSON",
            PermissionName::DeletePerson => "DELETE_PERSON",
            PermissionName::GetRoles => "GET_ROLES",
            PermissionName::GetRole => "GET_ROLE",
            PermissionName::CreateRole => "CREATE_ROLE",
            PermissionName::UpdateRole => "UPDATE_ROLE",
            PermissionName::DeleteRole => "DELETE_ROLE",
            PermissionName::AssignRolePermission => "ASSIGN_ROLE_PERMISSION",
            PermissionName::RemoveRolePermission => "REMOVE_ROLE_PERMISSION",
        }
    }

    /// Human readable label shown in administration screens.
    pub fn label(&self) -> &'static str {
        match self {
            PermissionName::GetPersons => "List persons",
            PermissionName::GetPerson => "View person",
            PermissionName::CreatePerson => "Create person",
            PermissionName::UpdatePerson => "Update person",
            PermissionName::DeletePerson => "Delete person",
            PermissionName::GetRoles => "List roles",
            PermissionName::GetRole => "View role",
            PermissionName::CreateRole => "Create role",
            PermissionName::UpdateRole => "Update role",
            PermissionName::DeleteRole => "Delete role",
            PermissionName::AssignRolePermission => "Assign permission to role",
            PermissionName::RemoveRolePermission => "Remove permission from role",
        }
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionName {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionName::ALL.into_iter().find(|p| p.as_str() == s).ok_or_else(|| UnknownName {
            kind: "permission",
            value: s.to_string(),
        })
    }
}

/// Classroom section a student is enrolled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Section {
    A,
    B,
    C,
    D,
    E,
}

impl Section {
    pub const ALL: [Section; 5] = [Section::A, Section::B, Section::C, Section::D, Section::E];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::A => "A",
            Section::B => "B",
            Section::C => "C",
            Section::D => "D",
            Section::E => "E",
        }
    }
}

impl FromStr for Section {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL.into_iter().find(|v| v.as_str() == s).ok_or_else(|| UnknownName {
            kind: "section",
            value: s.to_string(),
        })
    }
}

/// School level a student is enrolled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchoolLevel {
    Primary,
    Secondary,
}

impl SchoolLevel {
    pub const ALL: [SchoolLevel; 2] = [SchoolLevel::Primary, SchoolLevel::Secondary];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchoolLevel::Primary => "PRIMARY",
            SchoolLevel::Secondary => "SECONDARY",
        }
    }
}

impl FromStr for SchoolLevel {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SchoolLevel::ALL.into_iter().find(|v| v.as_str() == s).ok_or_else(|| UnknownName {
            kind: "school level",
            value: s.to_string(),
        })
    }
}
