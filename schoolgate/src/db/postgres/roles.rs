use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

use super::PgStore;
use crate::db::errors::{DbError, Result};
use crate::db::models::roles::{RoleCreateDBRequest, RoleDBResponse};
use crate::db::store::RoleStore;
use crate::types::{Operation, PermissionName, RoleId, RoleName, abbrev_uuid};

#[derive(FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl RoleRow {
    fn into_response(self, permissions: Vec<PermissionName>) -> Result<RoleDBResponse> {
        Ok(RoleDBResponse {
            id: self.id,
            name: self.name.parse::<RoleName>()?,
            description: self.description,
            permissions,
            created_at: self.created_at,
        })
    }
}

async fn role_permissions(conn: &mut PgConnection, id: RoleId) -> Result<Vec<PermissionName>> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT p.name FROM role_permissions rp JOIN permissions p ON p.id = rp.permission_id
         WHERE rp.role_id = $1 ORDER BY p.name",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(names.iter().map(|n| n.parse()).collect::<std::result::Result<Vec<_>, _>>()?)
}

async fn load_role(conn: &mut PgConnection, id: RoleId, lock: bool) -> Result<Option<RoleDBResponse>> {
    let sql = if lock {
        "SELECT id, name, description, created_at FROM roles WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT id, name, description, created_at FROM roles WHERE id = $1"
    };
    let Some(row) = sqlx::query_as::<_, RoleRow>(sql).bind(id).fetch_optional(&mut *conn).await? else {
        return Ok(None);
    };
    let permissions = role_permissions(conn, row.id).await?;
    Ok(Some(row.into_response(permissions)?))
}

#[async_trait]
impl RoleStore for PgStore {
    #[instrument(skip(self), err)]
    async fn list_roles(&self) -> Result<Vec<RoleDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, RoleRow>("SELECT id, name, description, created_at FROM roles ORDER BY name")
            .fetch_all(&mut *conn)
            .await?;

        let pairs: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT rp.role_id, p.name FROM role_permissions rp JOIN permissions p ON p.id = rp.permission_id ORDER BY p.name",
        )
        .fetch_all(&mut *conn)
        .await?;

        let mut by_role: HashMap<Uuid, Vec<PermissionName>> = HashMap::new();
        for (role_id, name) in pairs {
            by_role.entry(role_id).or_default().push(name.parse()?);
        }

        rows.into_iter()
            .map(|row| {
                let permissions = by_role.remove(&row.id).unwrap_or_default();
                row.into_response(permissions)
            })
            .collect()
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn get_role(&self, id: RoleId) -> Result<Option<RoleDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        load_role(&mut conn, id, false).await
    }

    #[instrument(skip(self), fields(role = %name), err)]
    async fn get_role_by_name(&self, name: RoleName) -> Result<Option<RoleDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM roles WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&mut *conn)
            .await?;
        match id {
            Some(id) => load_role(&mut conn, id, false).await,
            None => Ok(None),
        }
    }

    #[instrument(skip(self, request), fields(role = %request.name), err)]
    async fn create_role(&self, request: &RoleCreateDBRequest) -> Result<RoleDBResponse> {
        let row = sqlx::query_as::<_, RoleRow>(
            "INSERT INTO roles (id, name, description, created_at) VALUES ($1, $2, $3, $4)
             RETURNING id, name, description, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(request.name.as_str())
        .bind(&request.description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        row.into_response(Vec::new())
    }

    #[instrument(skip(self, description), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn update_role_description(&self, id: RoleId, description: Option<String>) -> Result<Option<RoleDBResponse>> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE roles SET description = $2 WHERE id = $1")
            .bind(id)
            .bind(description)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        let role = load_role(&mut tx, id, false).await?;
        tx.commit().await?;
        Ok(role)
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn delete_role(&self, id: RoleId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let Some(role) = load_role(&mut tx, id, true).await? else {
            return Ok(false);
        };

        let holders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account_roles WHERE role_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if holders > 0 {
            return Err(DbError::ProtectedEntity {
                operation: Operation::Delete,
                reason: format!("role {} is held by {holders} account(s)", role.name),
                entity_type: "role".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let deleted = sqlx::query("DELETE FROM roles WHERE id = $1").bind(id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id), permission = %permission), err)]
    async fn add_role_permission(&self, id: RoleId, permission: PermissionName) -> Result<RoleDBResponse> {
        let mut tx = self.pool.begin().await?;
        load_role(&mut tx, id, true).await?.ok_or(DbError::NotFound)?;

        let permission_id: Uuid = sqlx::query_scalar("SELECT id FROM permissions WHERE name = $1")
            .bind(permission.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(id)
            .bind(permission_id)
            .execute(&mut *tx)
            .await?;

        let role = load_role(&mut tx, id, false).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;
        Ok(role)
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id), permission = %permission), err)]
    async fn remove_role_permission(&self, id: RoleId, permission: PermissionName) -> Result<RoleDBResponse> {
        let mut tx = self.pool.begin().await?;
        load_role(&mut tx, id, true).await?.ok_or(DbError::NotFound)?;

        sqlx::query(
            "DELETE FROM role_permissions
             WHERE role_id = $1 AND permission_id = (SELECT id FROM permissions WHERE name = $2)",
        )
        .bind(id)
        .bind(permission.as_str())
        .execute(&mut *tx)
        .await?;

        let role = load_role(&mut tx, id, false).await?.ok_or(DbError::NotFound)?;
        tx.commit().await?;
        Ok(role)
    }
}
