//! # schoolgate: authentication and access control for school records
//!
//! `schoolgate` is the HTTP service in front of a school's person records. It authenticates
//! accounts with a username and password, hands out signed bearer tokens, and decides on every
//! request whether the caller may perform the operation, based on the single role the account
//! holds and the permissions that role currently carries.
//!
//! ## Architecture
//!
//! The service is built on [Axum](https://github.com/tokio-rs/axum) and persists through the
//! store traits in [`db::store`]. PostgreSQL ([`db::postgres::PgStore`]) backs deployments;
//! [`db::in_memory::InMemoryStore`] backs tests and local runs.
//!
//! ### Request flow
//!
//! Every request under `/api` first passes [`auth::middleware::authenticate_request`]. Without an
//! `Authorization` header the caller is anonymous. With one, the token must be a valid, unexpired
//! bearer token naming an active account, or the request is rejected with 401. The account's
//! authorities are then resolved from the store, so a permission revoked from a role applies to
//! the very next request, even for tokens issued before the change.
//!
//! Handlers state what they need through extractors in [`auth::permissions`]. Anonymous callers
//! get 401; authenticated callers missing the authority get 403.
//!
//! ### Core components
//!
//! - [`api`]: Route handlers and request/response models
//! - [`auth`]: Password hashing, tokens, authority resolution and the authorization gate
//! - [`db`]: Store traits and their PostgreSQL and in-memory implementations
//! - [`config`]: YAML and environment configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use schoolgate::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = schoolgate::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     schoolgate::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Startup
//!
//! [`Application::new`] connects to the store (running migrations for PostgreSQL), seeds the
//! permission catalog and any missing roles with [`seed_rbac`], then makes sure the configured
//! administrator exists with [`create_initial_admin_user`].

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
mod email;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    auth::{middleware::authenticate_request, password, token::TokenKeys},
    config::{CorsOrigin, DatabaseConfig, RbacConfig},
    db::{
        in_memory::InMemoryStore,
        models::{accounts::AccountCreateDBRequest, roles::RoleCreateDBRequest},
        postgres::PgStore,
        store::{AccountStore, PermissionStore, RoleStore, Store},
    },
    email::EmailService,
    openapi::ApiDoc,
    types::{AccountId, PermissionName, RoleName, abbrev_uuid},
};
use anyhow::Context;
use axum::{
    Json, Router,
    http::{self, HeaderValue},
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use bon::Builder;
pub use config::Config;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `store`: Persistence for accounts, roles, permissions, reset tokens and persons
/// - `config`: Application configuration loaded from file and environment
/// - `tokens`: Signing and verification keys for bearer tokens
/// - `email`: Outgoing mail for password reset links
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .store(Arc::new(InMemoryStore::new()))
///     .tokens(Arc::new(TokenKeys::from_config(&config)?))
///     .email(Arc::new(EmailService::new(&config)?))
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub tokens: Arc<TokenKeys>,
    pub(crate) email: Arc<EmailService>,
}

/// Make sure the permission catalog and every role exist.
///
/// All catalog entries are upserted so labels follow the code. Roles missing from the store are
/// created and given their permissions from `rbac`; roles that already exist are left as they
/// are, so edits made through the API survive restarts.
#[instrument(skip_all)]
pub async fn seed_rbac<S>(store: &S, rbac: &RbacConfig) -> anyhow::Result<()>
where
    S: RoleStore + PermissionStore + ?Sized,
{
    for permission in PermissionName::ALL {
        store
            .upsert_permission(permission, permission.label())
            .await
            .with_context(|| format!("seed permission {permission}"))?;
    }

    for role in RoleName::ALL {
        if store.get_role_by_name(role).await?.is_some() {
            continue;
        }

        let created = store
            .create_role(&RoleCreateDBRequest {
                name: role,
                description: Some(role.default_description().to_string()),
            })
            .await
            .with_context(|| format!("seed role {role}"))?;

        for permission in rbac.seed_permissions(role) {
            store
                .add_role_permission(created.id, *permission)
                .await
                .with_context(|| format!("attach {permission} to {role}"))?;
        }
        info!(%role, permissions = rbac.seed_permissions(role).len(), "Seeded role");
    }

    Ok(())
}

/// Create the configured administrator account if it doesn't exist.
///
/// Idempotent: an existing account with the configured username is left untouched, including
/// its password. Without a configured password no account is created.
///
/// Returns the id of the administrator account, when there is one.
#[instrument(skip_all, fields(username = %config.admin.username))]
pub async fn create_initial_admin_user<S>(store: &S, config: &Config) -> anyhow::Result<Option<AccountId>>
where
    S: AccountStore + ?Sized,
{
    let admin = &config.admin;

    if let Some(existing) = store.get_account_by_username(&admin.username).await? {
        debug!(account_id = %abbrev_uuid(&existing.id), "Administrator account already exists");
        return Ok(Some(existing.id));
    }

    let Some(admin_password) = admin.password.clone() else {
        warn!("No admin.password configured, skipping administrator bootstrap");
        return Ok(None);
    };

    let params = config.auth.password.argon2_params();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&admin_password, params))
        .await
        .context("join admin password hashing task")??;

    let account = store
        .create_account(&AccountCreateDBRequest {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash,
            active: true,
            role: Some(RoleName::Administrator),
        })
        .await
        .context("create administrator account")?;

    info!(account_id = %abbrev_uuid(&account.id), "Created administrator account");
    Ok(Some(account.id))
}

/// Open the configured store. PostgreSQL is migrated before it is returned.
async fn setup_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match &config.database {
        DatabaseConfig::Postgres { url, pool } => {
            info!(
                max_connections = pool.max_connections,
                min_connections = pool.min_connections,
                "Connecting to PostgreSQL"
            );
            let pg_pool = PgPoolOptions::new()
                .max_connections(pool.max_connections)
                .min_connections(pool.min_connections)
                .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs))
                .connect(url)
                .await
                .context("connect to database")?;

            db::postgres::migrator().run(&pg_pool).await.context("run database migrations")?;
            Ok(Arc::new(PgStore::new(pg_pool)))
        }
        DatabaseConfig::InMemory => {
            warn!("Using the in-memory store; all data is lost on shutdown");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PUT, http::Method::DELETE])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.cors.allow_credentials);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `/api/*`: every endpoint, behind the authentication middleware
/// - `/api-docs/openapi.json` and `/docs`: the OpenAPI document and its Scalar rendering
///
/// CORS and request tracing wrap everything.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{auth, persons, roles, students, users};

    let api_routes = Router::new()
        // Authentication (public)
        .route("/auth/login", post(auth::login))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        // Accounts
        .route("/users", post(users::create_account))
        .route("/users/me", get(users::get_me))
        .route("/users/{id}/role", put(users::assign_role))
        // Roles and the permission catalog
        .route("/permissions", get(roles::list_permissions))
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route(
            "/roles/{id}",
            get(roles::get_role).put(roles::update_role).delete(roles::delete_role),
        )
        .route(
            "/roles/{id}/permissions/{name}",
            post(roles::add_role_permission).delete(roles::remove_role_permission),
        )
        // Person records
        .route("/persons", get(persons::list_persons).post(persons::create_person))
        .route(
            "/persons/{id}",
            get(persons::get_person).put(persons::update_person).delete(persons::delete_person),
        )
        // Student records
        .route("/students", get(students::list_students).post(students::create_student))
        .route(
            "/students/{id}",
            get(students::get_student).put(students::update_student).delete(students::delete_student),
        )
        .layer(from_fn_with_state(state.clone(), authenticate_request))
        .with_state(state.clone());

    let router = Router::new()
        .nest("/api", api_routes)
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(create_cors_layer(&state.config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// The assembled service: store, state and router, ready to serve.
///
/// # Lifecycle
///
/// 1. **Initialization** ([`Application::new`]): opens the store, seeds roles and permissions,
///    bootstraps the administrator and builds the router
/// 2. **Serving** ([`Application::serve`]): binds the configured address and serves until the
///    shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting schoolgate with configuration: {:#?}", config);

        let tokens = TokenKeys::from_config(&config).context("load token signing secret")?;
        let email = EmailService::new(&config).context("set up email transport")?;

        let store = setup_store(&config).await?;
        seed_rbac(store.as_ref(), &config.rbac).await?;
        create_initial_admin_user(store.as_ref(), &config).await?;

        let app_state = AppState::builder()
            .store(store)
            .config(config.clone())
            .tokens(Arc::new(tokens))
            .email(Arc::new(email))
            .build();

        let router = build_router(app_state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "schoolgate listening on http://{}, docs at http://localhost:{}/docs",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}
