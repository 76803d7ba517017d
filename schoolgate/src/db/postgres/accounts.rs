use async_trait::async_trait;
use chrono::Utc;
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

use super::PgStore;
use crate::db::errors::{DbError, Result};
use crate::db::models::accounts::{AccountCreateDBRequest, AccountDBResponse, RoleGrant};
use crate::db::store::{AccountStore, RoleChangeGuard};
use crate::types::{AccountId, PermissionName, RoleName, abbrev_uuid};

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, active, created_at, updated_at";

#[derive(FromRow)]
struct GrantRow {
    role_name: String,
    permission_name: Option<String>,
}

/// Fold (role, permission) join rows into one grant per role. Rows arrive ordered by role name.
fn fold_grants(rows: Vec<GrantRow>) -> Result<Vec<RoleGrant>> {
    let mut grants: Vec<RoleGrant> = Vec::new();
    for row in rows {
        let role: RoleName = row.role_name.parse()?;
        if grants.last().map(|g| g.role) != Some(role) {
            grants.push(RoleGrant {
                role,
                permissions: Vec::new(),
            });
        }
        if let (Some(permission), Some(grant)) = (row.permission_name, grants.last_mut()) {
            grant.permissions.push(permission.parse::<PermissionName>()?);
        }
    }
    Ok(grants)
}

#[async_trait]
impl AccountStore for PgStore {
    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create_account(&self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let account = sqlx::query_as::<_, AccountDBResponse>(&format!(
            "INSERT INTO accounts (id, username, email, password_hash, active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(request.active)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(role) = request.role {
            let role_id: Uuid = sqlx::query_scalar("SELECT id FROM roles WHERE name = $1")
                .bind(role.as_str())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(DbError::NotFound)?;

            sqlx::query("INSERT INTO account_roles (account_id, role_id) VALUES ($1, $2)")
                .bind(account.id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn get_account(&self, id: AccountId) -> Result<Option<AccountDBResponse>> {
        let account = sqlx::query_as::<_, AccountDBResponse>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    #[instrument(skip(self), err)]
    async fn get_account_by_username(&self, username: &str) -> Result<Option<AccountDBResponse>> {
        let account = sqlx::query_as::<_, AccountDBResponse>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    #[instrument(skip(self, email), err)]
    async fn get_account_by_email(&self, email: &str) -> Result<Option<AccountDBResponse>> {
        let account = sqlx::query_as::<_, AccountDBResponse>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn account_grants(&self, id: AccountId) -> Result<Vec<RoleGrant>> {
        let rows = sqlx::query_as::<_, GrantRow>(
            "SELECT r.name AS role_name, p.name AS permission_name
             FROM account_roles ar
             JOIN roles r ON r.id = ar.role_id
             LEFT JOIN role_permissions rp ON rp.role_id = r.id
             LEFT JOIN permissions p ON p.id = rp.permission_id
             WHERE ar.account_id = $1
             ORDER BY r.name, p.name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        fold_grants(rows)
    }

    #[instrument(skip(self, guard), fields(account_id = %abbrev_uuid(&id), role = %role), err)]
    async fn replace_account_role(&self, id: AccountId, role: RoleName, guard: &RoleChangeGuard) -> Result<AccountDBResponse> {
        let mut tx = self.pool.begin().await?;

        // Row lock serialises this against password resets and other role changes
        let account = sqlx::query_as::<_, AccountDBResponse>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        let current: Vec<String> = sqlx::query_scalar(
            "SELECT r.name FROM account_roles ar JOIN roles r ON r.id = ar.role_id
             WHERE ar.account_id = $1 ORDER BY r.name",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        let current = current.iter().map(|name| name.parse::<RoleName>()).collect::<std::result::Result<Vec<_>, _>>()?;

        guard(&account, &current)?;

        let role_id: Uuid = sqlx::query_scalar("SELECT id FROM roles WHERE name = $1")
            .bind(role.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        sqlx::query("DELETE FROM account_roles WHERE account_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO account_roles (account_id, role_id) VALUES ($1, $2)")
            .bind(id)
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        let account = sqlx::query_as::<_, AccountDBResponse>(&format!(
            "UPDATE accounts SET updated_at = $2 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(account)
    }
}
