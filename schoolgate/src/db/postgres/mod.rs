//! PostgreSQL store implementation.
//!
//! Queries are plain runtime `sqlx` queries. Role and permission names are stored as text and
//! parsed back into [`RoleName`](crate::types::RoleName) / [`PermissionName`](crate::types::PermissionName)
//! on the way out, so a row outside the known set surfaces as an error instead of leaking through.

mod accounts;
mod password_reset_tokens;
mod permissions;
mod persons;
mod roles;
mod students;

use sqlx::{PgPool, migrate::Migrator};

/// Get the database migrator
pub fn migrator() -> Migrator {
    sqlx::migrate!("./migrations")
}

/// Store backed by a postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
