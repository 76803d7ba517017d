use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    auth::authorities::{AuthoritySet, resolve_authorities},
    db::store::AccountStore,
    errors::{Error, Result},
    types::AccountId,
};

/// The authenticated caller of a request, with the authorities resolved for this request only.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub authorities: AuthoritySet,
}

/// Authenticate a request from its `Authorization` header.
///
/// Returns:
/// - `Ok(None)`: no header, the caller is anonymous
/// - `Ok(Some(user))`: a valid bearer token for an active account
/// - `Err(Unauthenticated)`: a header is present but is not a valid bearer token, the token
///   has expired, or it names an account that no longer exists or is disabled
#[instrument(skip_all)]
pub async fn authenticate(state: &AppState, header: Option<&HeaderValue>) -> Result<Option<CurrentUser>> {
    let Some(header) = header else {
        trace!("No authorization header, continuing as anonymous");
        return Ok(None);
    };

    let header = header.to_str().map_err(|_| Error::Unauthenticated {
        message: Some("Invalid authorization header".to_string()),
    })?;

    // auth scheme names are case-insensitive
    let token = header
        .split_once(' ')
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Authorization header must use the Bearer scheme".to_string()),
        })?;

    let claims = state.tokens.validate(token)?;

    let account = match state.store.get_account_by_username(&claims.sub).await? {
        Some(account) if account.active => account,
        Some(_) => {
            debug!(username = %claims.sub, "Token presented for a disabled account");
            return Err(Error::Unauthenticated { message: None });
        }
        None => {
            debug!(username = %claims.sub, "Token presented for an account that no longer exists");
            return Err(Error::Unauthenticated { message: None });
        }
    };

    let authorities = resolve_authorities(state.store.as_ref(), &account).await?;
    trace!(username = %account.username, authorities = authorities.len(), "Authenticated bearer token");

    Ok(Some(CurrentUser {
        id: account.id,
        username: account.username,
        email: account.email,
        authorities,
    }))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // The middleware has already authenticated anything under the router
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let header = parts.headers.get(AUTHORIZATION).cloned();
        authenticate(state, header.as_ref()).await?.ok_or(Error::Unauthenticated { message: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::RoleStore;
    use crate::test_utils::{bearer, create_test_account, create_test_state, create_test_state_with_store};
    use crate::types::{PermissionName, RoleName};

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[tokio::test]
    async fn test_no_header_is_anonymous() {
        let state = create_test_state().await;
        assert!(authenticate(&state, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_valid_token_resolves_fresh_authorities() {
        let state = create_test_state().await;
        create_test_account(&state, "alice", Some(RoleName::Teacher)).await;

        let user = authenticate(&state, Some(&header(&bearer(&state, "alice")))).await.unwrap().unwrap();

        assert_eq!(user.username, "alice");
        assert!(user.authorities.has_role(RoleName::Teacher));
        assert!(user.authorities.has_permission(PermissionName::GetPerson));
        assert!(user.authorities.has_permission(PermissionName::GetPersons));
        assert!(!user.authorities.has_permission(PermissionName::DeletePerson));
    }

    #[tokio::test]
    async fn test_malformed_headers_are_unauthenticated() {
        let state = create_test_state().await;
        create_test_account(&state, "alice", Some(RoleName::Teacher)).await;
        let token = state.tokens.issue("alice").unwrap().token;

        for value in [
            "Bearer".to_string(),
            "Bearer ".to_string(),
            "Bearer not-a-token".to_string(),
            format!("Basic {token}"),
            format!("Bearerish {token}"),
            token.clone(),
        ] {
            let err = authenticate(&state, Some(&header(&value))).await.unwrap_err();
            assert!(matches!(err, Error::Unauthenticated { .. }), "header {value:?} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn test_bearer_scheme_is_case_insensitive() {
        let state = create_test_state().await;
        create_test_account(&state, "alice", Some(RoleName::Teacher)).await;
        let token = state.tokens.issue("alice").unwrap().token;

        for scheme in ["bearer", "BEARER", "BeArEr"] {
            let user = authenticate(&state, Some(&header(&format!("{scheme} {token}")))).await.unwrap().unwrap();
            assert_eq!(user.username, "alice");
        }
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthenticated() {
        let state = create_test_state().await;
        create_test_account(&state, "alice", Some(RoleName::Teacher)).await;
        let expired = state
            .tokens
            .issue_at("alice", chrono::Utc::now() - chrono::Duration::hours(3))
            .unwrap()
            .token;

        let err = authenticate(&state, Some(&header(&format!("Bearer {expired}")))).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_token_for_deleted_account_is_unauthenticated() {
        let (state, store) = create_test_state_with_store().await;
        let account = create_test_account(&state, "ghost", Some(RoleName::Student)).await;
        let value = header(&bearer(&state, "ghost"));

        assert!(authenticate(&state, Some(&value)).await.unwrap().is_some());

        assert!(store.delete_account(account.id));
        let err = authenticate(&state, Some(&value)).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_token_for_disabled_account_is_unauthenticated() {
        let (state, store) = create_test_state_with_store().await;
        let account = create_test_account(&state, "bob", Some(RoleName::Student)).await;
        let value = header(&bearer(&state, "bob"));

        store.set_account_active(account.id, false).unwrap();
        let err = authenticate(&state, Some(&value)).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_revoked_permission_applies_to_existing_token() {
        let state = create_test_state().await;
        create_test_account(&state, "alice", Some(RoleName::Teacher)).await;
        let value = header(&bearer(&state, "alice"));

        let teacher = state.store.get_role_by_name(RoleName::Teacher).await.unwrap().unwrap();
        state.store.remove_role_permission(teacher.id, PermissionName::GetPerson).await.unwrap();

        let user = authenticate(&state, Some(&value)).await.unwrap().unwrap();
        assert!(!user.authorities.has_permission(PermissionName::GetPerson));
        assert!(user.authorities.has_permission(PermissionName::GetPersons));
    }
}
