use axum::{Json, extract::State};
use chrono::Utc;
use tracing::{debug, error, info};

use crate::{
    AppState,
    api::models::auth::{ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, ResetPasswordRequest},
    auth::{authorities::resolve_authorities, password},
    db::{
        models::password_reset_tokens::{PasswordResetTokenCreateDBRequest, ResetOutcome},
        store::{AccountStore, PasswordResetTokenStore},
    },
    errors::Error,
    types::{AccountId, abbrev_uuid},
};

const RESET_REQUESTED_MESSAGE: &str = "If an account with that email exists, a password reset link has been sent.";

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid username or password".to_string()),
    }
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>, Error> {
    // Unknown and disabled accounts fail exactly like a wrong password
    let account = state
        .store
        .get_account_by_username(&request.username)
        .await?
        .filter(|account| account.active)
        .ok_or_else(invalid_credentials)?;

    // Verify password on a blocking thread to avoid blocking async runtime
    let password = request.password;
    let hash = account.password_hash.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        debug!(username = %account.username, "Rejected login with wrong password");
        return Err(invalid_credentials());
    }

    let authorities = resolve_authorities(state.store.as_ref(), &account).await?;
    let issued = state.tokens.issue(&account.username)?;
    info!(
        username = %account.username,
        roles = ?authorities.roles(),
        expires_at = %issued.expires_at,
        "Issued bearer token"
    );

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.validity().as_secs(),
    }))
}

/// Store a fresh reset token for the account and return the raw token to be emailed.
pub(crate) async fn create_reset_token(state: &AppState, account_id: AccountId) -> Result<String, Error> {
    let validity = chrono::Duration::from_std(state.config.auth.password_reset.token_duration).map_err(|e| Error::Internal {
        operation: format!("convert reset token duration: {e}"),
    })?;

    let raw_token = password::generate_reset_token();
    state
        .store
        .create_reset_token(&PasswordResetTokenCreateDBRequest {
            account_id,
            token_digest: password::reset_token_digest(&raw_token),
            expires_at: Utc::now() + validity,
        })
        .await?;

    Ok(raw_token)
}

/// Request a password reset email
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Reset requested; the response is identical whether or not the email is registered", body = MessageResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, Error> {
    // Return success response to avoid email enumeration attacks
    // Only send email if the account actually exists
    match state.store.get_account_by_email(request.email.trim()).await? {
        Some(account) if account.active => match create_reset_token(&state, account.id).await {
            Ok(raw_token) => {
                if let Err(e) = state
                    .email
                    .send_password_reset_email(&account.email, &account.username, &raw_token)
                    .await
                {
                    error!(account_id = %abbrev_uuid(&account.id), "Failed to send password reset email: {e}");
                } else {
                    info!(account_id = %abbrev_uuid(&account.id), "Sent password reset email");
                }
            }
            // the caller sees the same response as for an unregistered email
            Err(e) => error!(account_id = %abbrev_uuid(&account.id), "Failed to store password reset token: {e}"),
        },
        Some(account) => {
            debug!(account_id = %abbrev_uuid(&account.id), "Ignoring reset request for a disabled account");
        }
        None => {
            debug!("Ignoring reset request for an unregistered email");
        }
    }

    Ok(Json(MessageResponse {
        message: RESET_REQUESTED_MESSAGE.to_string(),
    }))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password reset successful", body = MessageResponse),
        (status = 400, description = "Invalid or expired token, or the new password is unacceptable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, Error> {
    state.config.auth.password.check_length(&request.new_password)?;

    // Hash new password
    let params = state.config.auth.password.argon2_params();
    let new_password_hash = tokio::task::spawn_blocking({
        let password = request.new_password;
        move || password::hash_password(&password, params)
    })
    .await
    .map_err(|e| Error::Internal {
        operation: format!("spawn password hashing task: {e}"),
    })??;

    let digest = password::reset_token_digest(request.token.trim());
    match state.store.consume_reset_token(&digest, &new_password_hash, Utc::now()).await? {
        ResetOutcome::Completed { account_id } => {
            info!(account_id = %abbrev_uuid(&account_id), "Password reset completed");
            Ok(Json(MessageResponse {
                message: "Password has been reset successfully".to_string(),
            }))
        }
        ResetOutcome::NotFound => Err(Error::BadRequest {
            message: "Invalid password reset token".to_string(),
        }),
        ResetOutcome::Expired => Err(Error::BadRequest {
            message: "Password reset token has expired".to_string(),
        }),
    }
}
