use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::PgStore;
use crate::db::errors::Result;
use crate::db::models::password_reset_tokens::{PasswordResetTokenCreateDBRequest, PasswordResetTokenDBResponse, ResetOutcome};
use crate::db::store::PasswordResetTokenStore;
use crate::types::abbrev_uuid;

#[async_trait]
impl PasswordResetTokenStore for PgStore {
    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&request.account_id)), err)]
    async fn create_reset_token(&self, request: &PasswordResetTokenCreateDBRequest) -> Result<PasswordResetTokenDBResponse> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let purged = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if purged.rows_affected() > 0 {
            debug!(purged = purged.rows_affected(), "Purged expired password reset tokens");
        }

        let token = sqlx::query_as::<_, PasswordResetTokenDBResponse>(
            "INSERT INTO password_reset_tokens (id, account_id, token_digest, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, account_id, token_digest, expires_at, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(request.account_id)
        .bind(&request.token_digest)
        .bind(request.expires_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(token)
    }

    #[instrument(skip(self, token_digest, new_password_hash), err)]
    async fn consume_reset_token(&self, token_digest: &[u8], new_password_hash: &str, now: DateTime<Utc>) -> Result<ResetOutcome> {
        let mut tx = self.pool.begin().await?;

        let token = sqlx::query_as::<_, PasswordResetTokenDBResponse>(
            "SELECT id, account_id, token_digest, expires_at, created_at
             FROM password_reset_tokens WHERE token_digest = $1 FOR UPDATE",
        )
        .bind(token_digest)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(token) = token else {
            return Ok(ResetOutcome::NotFound);
        };
        if token.expires_at <= now {
            return Ok(ResetOutcome::Expired);
        }

        let updated = sqlx::query("UPDATE accounts SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(token.account_id)
            .bind(new_password_hash)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Ok(ResetOutcome::NotFound);
        }

        sqlx::query("DELETE FROM password_reset_tokens WHERE account_id = $1")
            .bind(token.account_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ResetOutcome::Completed {
            account_id: token.account_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::AccountStore;
    use crate::test_utils::{account_request, create_pg_store};
    use chrono::Duration;
    use sqlx::PgPool;

    fn token(account_id: crate::types::AccountId, digest: u8, expires_at: DateTime<Utc>) -> PasswordResetTokenCreateDBRequest {
        PasswordResetTokenCreateDBRequest {
            account_id,
            token_digest: vec![digest; 32],
            expires_at,
        }
    }

    async fn token_count(pool: &PgPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM password_reset_tokens").fetch_one(pool).await.unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reset_token_is_single_use_and_clears_siblings(pool: PgPool) {
        let store = create_pg_store(pool.clone()).await;
        let account = store.create_account(&account_request("rita", None)).await.unwrap();
        let now = Utc::now();
        store.create_reset_token(&token(account.id, 1, now + Duration::hours(1))).await.unwrap();
        store.create_reset_token(&token(account.id, 2, now + Duration::hours(1))).await.unwrap();

        let outcome = store.consume_reset_token(&[1u8; 32], "$argon2id$new", now).await.unwrap();
        assert_eq!(outcome, ResetOutcome::Completed { account_id: account.id });
        assert_eq!(store.get_account(account.id).await.unwrap().unwrap().password_hash, "$argon2id$new");

        assert_eq!(store.consume_reset_token(&[1u8; 32], "x", now).await.unwrap(), ResetOutcome::NotFound);
        assert_eq!(store.consume_reset_token(&[2u8; 32], "x", now).await.unwrap(), ResetOutcome::NotFound);
        assert_eq!(token_count(&pool).await, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_expired_reset_token_leaves_password(pool: PgPool) {
        let store = create_pg_store(pool.clone()).await;
        let account = store.create_account(&account_request("eve", None)).await.unwrap();
        let issued = Utc::now();
        store.create_reset_token(&token(account.id, 9, issued + Duration::minutes(60))).await.unwrap();

        let outcome = store
            .consume_reset_token(&[9u8; 32], "$argon2id$new", issued + Duration::minutes(61))
            .await
            .unwrap();
        assert_eq!(outcome, ResetOutcome::Expired);
        assert_eq!(
            store.get_account(account.id).await.unwrap().unwrap().password_hash,
            "$argon2id$placeholder"
        );
        assert_eq!(token_count(&pool).await, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_creating_reset_token_purges_expired_ones(pool: PgPool) {
        let store = create_pg_store(pool.clone()).await;
        let account = store.create_account(&account_request("rita", None)).await.unwrap();
        let now = Utc::now();

        store.create_reset_token(&token(account.id, 1, now - Duration::minutes(5))).await.unwrap();
        store.create_reset_token(&token(account.id, 2, now + Duration::hours(1))).await.unwrap();
        assert_eq!(token_count(&pool).await, 1);

        let err = store.create_reset_token(&token(account.id, 2, now + Duration::hours(1))).await.unwrap_err();
        assert!(matches!(err, crate::db::errors::DbError::UniqueViolation { .. }));
    }
}
