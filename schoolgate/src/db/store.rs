//! Store traits the auth core and the API handlers depend on.
//!
//! Two implementations exist: [`crate::db::postgres::PgStore`] for deployments and
//! [`crate::db::in_memory::InMemoryStore`] for tests and local runs. Handlers only ever see
//! `Arc<dyn Store>`.
//!
//! Every mutating method is atomic on its own. Methods that must check an invariant against
//! current state (role replacement, role deletion, reset token consumption) do the check
//! inside the same transaction as the write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::errors::Result;
use crate::db::models::{
    accounts::{AccountCreateDBRequest, AccountDBResponse, RoleGrant},
    password_reset_tokens::{PasswordResetTokenCreateDBRequest, PasswordResetTokenDBResponse, ResetOutcome},
    persons::{PersonDBResponse, PersonWriteDBRequest},
    roles::{PermissionDBResponse, RoleCreateDBRequest, RoleDBResponse},
    students::{StudentDBResponse, StudentWriteDBRequest},
};
use crate::types::{AccountId, PermissionName, PersonId, RoleId, RoleName};

/// Check run against an account and the roles it currently holds, before those roles are replaced.
/// Returning an error aborts the replacement and leaves the account untouched.
pub type RoleChangeGuard = dyn Fn(&AccountDBResponse, &[RoleName]) -> Result<()> + Send + Sync;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create an account, assigning `request.role` when present
    async fn create_account(&self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse>;

    async fn get_account(&self, id: AccountId) -> Result<Option<AccountDBResponse>>;

    async fn get_account_by_username(&self, username: &str) -> Result<Option<AccountDBResponse>>;

    async fn get_account_by_email(&self, email: &str) -> Result<Option<AccountDBResponse>>;

    /// Roles held by the account, each with its currently attached permissions.
    /// Normally zero or one entry; more than one means the data has drifted.
    async fn account_grants(&self, id: AccountId) -> Result<Vec<RoleGrant>>;

    /// Replace every role the account holds with `role`.
    ///
    /// `guard` sees the account and its roles as locked by the transaction. Errors with
    /// `NotFound` if the account or the role row does not exist.
    async fn replace_account_role(&self, id: AccountId, role: RoleName, guard: &RoleChangeGuard) -> Result<AccountDBResponse>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<RoleDBResponse>>;

    async fn get_role(&self, id: RoleId) -> Result<Option<RoleDBResponse>>;

    async fn get_role_by_name(&self, name: RoleName) -> Result<Option<RoleDBResponse>>;

    /// Create a role with no permissions. A duplicate name is a `UniqueViolation`.
    async fn create_role(&self, request: &RoleCreateDBRequest) -> Result<RoleDBResponse>;

    /// Change the description. The name is never written.
    async fn update_role_description(&self, id: RoleId, description: Option<String>) -> Result<Option<RoleDBResponse>>;

    /// Delete a role. `ProtectedEntity` while any account holds it; `false` if it did not exist.
    async fn delete_role(&self, id: RoleId) -> Result<bool>;

    /// Attach a permission. Attaching one that is already present is a no-op.
    async fn add_role_permission(&self, id: RoleId, permission: PermissionName) -> Result<RoleDBResponse>;

    /// Detach a permission. Detaching one that is absent is a no-op.
    async fn remove_role_permission(&self, id: RoleId, permission: PermissionName) -> Result<RoleDBResponse>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn list_permissions(&self) -> Result<Vec<PermissionDBResponse>>;

    async fn get_permission(&self, name: PermissionName) -> Result<Option<PermissionDBResponse>>;

    /// Insert a catalog entry, or refresh its label if it exists
    async fn upsert_permission(&self, name: PermissionName, label: &str) -> Result<PermissionDBResponse>;
}

#[async_trait]
pub trait PasswordResetTokenStore: Send + Sync {
    async fn create_reset_token(&self, request: &PasswordResetTokenCreateDBRequest) -> Result<PasswordResetTokenDBResponse>;

    /// Spend a token: when it exists and `now` is before its expiry, set the account's
    /// password hash and delete every reset token of that account, all in one transaction.
    async fn consume_reset_token(&self, token_digest: &[u8], new_password_hash: &str, now: DateTime<Utc>) -> Result<ResetOutcome>;
}

#[async_trait]
pub trait PersonStore: Send + Sync {
    async fn list_persons(&self) -> Result<Vec<PersonDBResponse>>;

    async fn get_person(&self, id: PersonId) -> Result<Option<PersonDBResponse>>;

    async fn create_person(&self, request: &PersonWriteDBRequest) -> Result<PersonDBResponse>;

    async fn update_person(&self, id: PersonId, request: &PersonWriteDBRequest) -> Result<Option<PersonDBResponse>>;

    async fn delete_person(&self, id: PersonId) -> Result<bool>;
}

/// Students are person records with enrolment details. The person row and the enrolment row
/// are written together, and deleting a student deletes its person record.
#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn list_students(&self) -> Result<Vec<StudentDBResponse>>;

    /// `None` when the id is unknown or names a person who is not a student
    async fn get_student(&self, id: PersonId) -> Result<Option<StudentDBResponse>>;

    async fn create_student(&self, request: &StudentWriteDBRequest) -> Result<StudentDBResponse>;

    async fn update_student(&self, id: PersonId, request: &StudentWriteDBRequest) -> Result<Option<StudentDBResponse>>;

    async fn delete_student(&self, id: PersonId) -> Result<bool>;
}

/// Everything the application needs from persistence.
pub trait Store: AccountStore + RoleStore + PermissionStore + PasswordResetTokenStore + PersonStore + StudentStore {}

impl<T> Store for T where T: AccountStore + RoleStore + PermissionStore + PasswordResetTokenStore + PersonStore + StudentStore {}
