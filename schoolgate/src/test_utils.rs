//! Test utilities: configs, states over the in-memory store, seeded accounts and bearer tokens,
//! plus a seeded [`PgStore`] for the `#[sqlx::test]` store tests.

use std::{path::Path, sync::Arc};

use axum_test::TestServer;
use sqlx::PgPool;
use tempfile::TempDir;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{password, token::TokenKeys},
    config::{Config, EmailTransportConfig, RbacConfig},
    db::{
        in_memory::InMemoryStore,
        models::accounts::{AccountCreateDBRequest, AccountDBResponse},
        postgres::PgStore,
        store::AccountStore,
    },
    email::EmailService,
    types::RoleName,
};

/// Password every account made by [`create_test_account`] logs in with
pub const TEST_PASSWORD: &str = "correct-horse-battery";

const TEST_SECRET: &str = "test-secret-key-that-is-at-least-32-bytes";

/// Config with a signing secret, cheap Argon2 costs and a file email transport writing into the
/// returned temp dir. Keep the dir alive for as long as the config is used.
pub fn create_test_config() -> (Config, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = config_with_email_dir(dir.path());
    (config, dir)
}

fn config_with_email_dir(path: &Path) -> Config {
    let mut config = Config {
        secret_key: Some(TEST_SECRET.to_string()),
        ..Default::default()
    };
    config.auth.password.argon2_memory_kib = 1024;
    config.auth.password.argon2_iterations = 1;
    config.auth.password.argon2_parallelism = 1;
    config.email.transport = EmailTransportConfig::File {
        path: path.to_string_lossy().into_owned(),
    };
    config
}

/// Seeded state whose emails land in `dir`
pub async fn create_test_state_in(dir: &Path) -> AppState {
    create_state(config_with_email_dir(dir), InMemoryStore::new()).await
}

pub async fn create_test_state_with_config(config: Config) -> AppState {
    create_state(config, InMemoryStore::new()).await
}

/// Seeded state plus a handle on its store, for tests that reach past the store traits
pub async fn create_test_state_with_store() -> (AppState, InMemoryStore) {
    let store = InMemoryStore::new();
    let state = create_state(default_test_config(), store.clone()).await;
    (state, store)
}

pub async fn create_test_state() -> AppState {
    create_state(default_test_config(), InMemoryStore::new()).await
}

fn default_test_config() -> Config {
    let dir = std::env::temp_dir().join(format!("schoolgate-test-emails-{}", Uuid::new_v4()));
    config_with_email_dir(&dir)
}

async fn create_state(config: Config, store: InMemoryStore) -> AppState {
    crate::seed_rbac(&store, &config.rbac).await.expect("Failed to seed roles");

    AppState::builder()
        .store(Arc::new(store))
        .tokens(Arc::new(TokenKeys::from_config(&config).expect("Failed to build token keys")))
        .email(Arc::new(EmailService::new(&config).expect("Failed to create email service")))
        .config(config)
        .build()
}

/// Active account `{username}@school.test` with [`TEST_PASSWORD`]
pub async fn create_test_account(state: &AppState, username: &str, role: Option<RoleName>) -> AccountDBResponse {
    let password_hash =
        password::hash_password(TEST_PASSWORD, state.config.auth.password.argon2_params()).expect("Failed to hash password");

    state
        .store
        .create_account(&AccountCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@school.test"),
            password_hash,
            active: true,
            role,
        })
        .await
        .expect("Failed to create test account")
}

/// `Authorization` header value for a freshly issued token
pub fn bearer(state: &AppState, username: &str) -> String {
    let issued = state.tokens.issue(username).expect("Failed to issue token");
    format!("Bearer {}", issued.token)
}

/// The full router over `state`
pub fn create_test_server(state: AppState) -> TestServer {
    let router = crate::build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// Store over the per-test database handed out by `#[sqlx::test]`, with the default roles seeded
pub async fn create_pg_store(pool: PgPool) -> PgStore {
    let store = PgStore::new(pool);
    crate::seed_rbac(&store, &RbacConfig::default()).await.expect("Failed to seed roles");
    store
}

/// Account request with a placeholder hash, for store tests that never log in
pub fn account_request(username: &str, role: Option<RoleName>) -> AccountCreateDBRequest {
    AccountCreateDBRequest {
        username: username.to_string(),
        email: format!("{username}@school.test"),
        password_hash: "$argon2id$placeholder".to_string(),
        active: true,
        role,
    }
}
