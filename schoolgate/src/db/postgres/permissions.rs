use async_trait::async_trait;
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

use super::PgStore;
use crate::db::errors::Result;
use crate::db::models::roles::PermissionDBResponse;
use crate::db::store::PermissionStore;
use crate::types::PermissionName;

#[derive(FromRow)]
struct PermissionRow {
    id: Uuid,
    name: String,
    label: String,
}

impl TryFrom<PermissionRow> for PermissionDBResponse {
    type Error = crate::db::errors::DbError;

    fn try_from(row: PermissionRow) -> Result<Self> {
        Ok(PermissionDBResponse {
            id: row.id,
            name: row.name.parse()?,
            label: row.label,
        })
    }
}

#[async_trait]
impl PermissionStore for PgStore {
    #[instrument(skip(self), err)]
    async fn list_permissions(&self) -> Result<Vec<PermissionDBResponse>> {
        let rows = sqlx::query_as::<_, PermissionRow>("SELECT id, name, label FROM permissions ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(PermissionDBResponse::try_from).collect()
    }

    #[instrument(skip(self), fields(permission = %name), err)]
    async fn get_permission(&self, name: PermissionName) -> Result<Option<PermissionDBResponse>> {
        let row = sqlx::query_as::<_, PermissionRow>("SELECT id, name, label FROM permissions WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(PermissionDBResponse::try_from).transpose()
    }

    #[instrument(skip(self, label), fields(permission = %name), err)]
    async fn upsert_permission(&self, name: PermissionName, label: &str) -> Result<PermissionDBResponse> {
        let row = sqlx::query_as::<_, PermissionRow>(
            "INSERT INTO permissions (id, name, label) VALUES ($1, $2, $3)
             ON CONFLICT (name) DO UPDATE SET label = EXCLUDED.label
             RETURNING id, name, label",
        )
        .bind(Uuid::new_v4())
        .bind(name.as_str())
        .bind(label)
        .fetch_one(&self.pool)
        .await?;
        PermissionDBResponse::try_from(row)
    }
}
