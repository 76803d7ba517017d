use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::trace;

use crate::{AppState, auth::current_user::authenticate, errors::Error};

/// Implementation for [`authenticate_request`]. Attaches the caller to the request extensions
/// when a valid bearer token is present; anonymous requests pass through untouched.
pub(crate) async fn attach_current_user(state: AppState, mut request: Request) -> Result<Request, Error> {
    let header = request.headers().get(AUTHORIZATION).cloned();

    if let Some(user) = authenticate(&state, header.as_ref()).await? {
        trace!(username = %user.username, path = %request.uri().path(), "Attached authenticated caller");
        request.extensions_mut().insert(user);
    }

    Ok(request)
}

/// Middleware run in front of every route. A present but malformed, expired or unverifiable
/// token is rejected with 401 here, even on routes that would admit anonymous callers.
pub async fn authenticate_request(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    let request = attach_current_user(state, request).await?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::current_user::CurrentUser;
    use crate::test_utils::{bearer, create_test_account, create_test_state};
    use crate::types::RoleName;
    use axum::{Extension, Router, body::Body, routing::get};
    use axum_test::TestServer;

    async fn whoami(user: Option<Extension<CurrentUser>>) -> String {
        match user {
            Some(Extension(user)) => user.username,
            None => "anonymous".to_string(),
        }
    }

    fn server(state: AppState) -> TestServer {
        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(axum::middleware::from_fn_with_state(state.clone(), authenticate_request))
            .with_state(state);
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn test_anonymous_request_passes_through() {
        let state = create_test_state().await;
        let request = Request::builder().uri("/whoami").body(Body::empty()).unwrap();

        let request = attach_current_user(state, request).await.unwrap();
        assert!(request.extensions().get::<CurrentUser>().is_none());
    }

    #[tokio::test]
    async fn test_valid_token_attaches_user() {
        let state = create_test_state().await;
        create_test_account(&state, "alice", Some(RoleName::Teacher)).await;

        let response = server(state.clone()).get("/whoami").add_header("authorization", bearer(&state, "alice")).await;

        response.assert_status_ok();
        response.assert_text("alice");
    }

    #[tokio::test]
    async fn test_malformed_token_rejected_even_on_open_route() {
        let state = create_test_state().await;
        let server = server(state);

        let response = server.get("/whoami").await;
        response.assert_status_ok();
        response.assert_text("anonymous");

        let response = server.get("/whoami").add_header("authorization", "Bearer garbage").await;
        response.assert_status_unauthorized();
    }
}
