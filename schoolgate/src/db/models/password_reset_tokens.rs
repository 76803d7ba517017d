//! Database models for password reset tokens.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::AccountId;

/// Stored reset token. Only the SHA-256 digest of the emailed token is kept.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordResetTokenDBResponse {
    pub id: Uuid,
    pub account_id: AccountId,
    pub token_digest: Vec<u8>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Request for creating a password reset token
#[derive(Debug, Clone)]
pub struct PasswordResetTokenCreateDBRequest {
    pub account_id: AccountId,
    pub token_digest: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

/// Result of trying to spend a reset token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Password replaced and every reset token of the account deleted
    Completed { account_id: AccountId },
    /// No token with that digest exists (never issued, or already used)
    NotFound,
    /// Token exists but its expiry has passed; nothing was changed
    Expired,
}
