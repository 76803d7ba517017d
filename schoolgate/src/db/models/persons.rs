//! Database models for person records.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

use crate::types::{AccountId, PersonId};

/// Fields written on create and on full update
#[derive(Debug, Clone)]
pub struct PersonWriteDBRequest {
    pub first_name: String,
    pub last_name: String,
    pub dni: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub account_id: Option<AccountId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PersonDBResponse {
    pub id: PersonId,
    pub first_name: String,
    pub last_name: String,
    pub dni: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
