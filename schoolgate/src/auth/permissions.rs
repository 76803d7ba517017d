//! Authorization gate.
//!
//! Routes declare what they require with the extractors in this module:
//!
//! ```ignore
//! async fn get_person(
//!     State(state): State<AppState>,
//!     Path(id): Path<PersonId>,
//!     current_user: RequiresPermission<permission::GetPerson>,
//! ) -> Result<Json<PersonResponse>> { ... }
//! ```
//!
//! An anonymous caller is rejected with 401 before any authority is checked; an authenticated
//! caller without the required authority gets 403.

use std::{marker::PhantomData, ops::Deref};

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::{
    AppState,
    auth::{authorities::Authority, current_user::CurrentUser},
    errors::{Error, Result},
    types::{PermissionName, RoleName},
};

/// Type-level name of a permission, used as the parameter of [`RequiresPermission`].
pub trait PermissionMarker: Send + Sync + 'static {
    const PERMISSION: PermissionName;
}

/// Type-level name of a role, used as the parameter of [`RequiresRole`].
pub trait RoleMarker: Send + Sync + 'static {
    const ROLE: RoleName;
}

macro_rules! markers {
    ($trait:ident, $const:ident, $ty:ident; $($name:ident),+ $(,)?) => {
        $(
            pub struct $name;

            impl super::$trait for $name {
                const $const: crate::types::$ty = crate::types::$ty::$name;
            }
        )+
    };
}

pub mod permission {
    markers!(PermissionMarker, PERMISSION, PermissionName;
        GetPersons,
        GetPerson,
        CreatePerson,
        UpdatePerson,
        DeletePerson,
        GetRoles,
        GetRole,
        CreateRole,
        UpdateRole,
        DeleteRole,
        AssignRolePermission,
        RemoveRolePermission,
    );
}

pub mod role {
    markers!(RoleMarker, ROLE, RoleName; Administrator);
}

/// Check a caller against a required authority.
pub fn require(user: &CurrentUser, required: Authority) -> Result<()> {
    if user.authorities.contains(required) {
        Ok(())
    } else {
        debug!(username = %user.username, %required, "Caller lacks required authority");
        Err(Error::InsufficientPermissions { required })
    }
}

/// Extractor that admits only callers holding permission `P`.
pub struct RequiresPermission<P: PermissionMarker>(pub CurrentUser, PhantomData<P>);

impl<P: PermissionMarker> Deref for RequiresPermission<P> {
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<P: PermissionMarker> FromRequestParts<AppState> for RequiresPermission<P> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        require(&user, Authority::Permission(P::PERMISSION))?;
        Ok(Self(user, PhantomData))
    }
}

/// Extractor that admits only callers holding role `R`.
pub struct RequiresRole<R: RoleMarker>(pub CurrentUser, PhantomData<R>);

impl<R: RoleMarker> Deref for RequiresRole<R> {
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<R: RoleMarker> FromRequestParts<AppState> for RequiresRole<R> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        require(&user, Authority::Role(R::ROLE))?;
        Ok(Self(user, PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authorities::AuthoritySet;
    use crate::db::models::accounts::RoleGrant;
    use crate::test_utils::{bearer, create_test_account, create_test_state};
    use axum::{Router, routing::get};
    use axum_test::TestServer;
    use uuid::Uuid;

    fn user_with(role: RoleName, permissions: Vec<PermissionName>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "someone".to_string(),
            email: "someone@school.test".to_string(),
            authorities: AuthoritySet::from_grants(&[RoleGrant { role, permissions }]),
        }
    }

    #[test]
    fn test_markers_name_their_authorities() {
        assert_eq!(<permission::DeletePerson as PermissionMarker>::PERMISSION, PermissionName::DeletePerson);
        assert_eq!(<permission::AssignRolePermission as PermissionMarker>::PERMISSION, PermissionName::AssignRolePermission);
        assert_eq!(<role::Administrator as RoleMarker>::ROLE, RoleName::Administrator);
    }

    #[test]
    fn test_require() {
        let teacher = user_with(RoleName::Teacher, vec![PermissionName::GetPerson]);

        assert!(require(&teacher, Authority::Permission(PermissionName::GetPerson)).is_ok());
        assert!(require(&teacher, Authority::Role(RoleName::Teacher)).is_ok());

        let err = require(&teacher, Authority::Permission(PermissionName::DeletePerson)).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientPermissions {
                required: Authority::Permission(PermissionName::DeletePerson)
            }
        ));
        assert!(require(&teacher, Authority::Role(RoleName::Administrator)).is_err());
    }

    async fn read_person(user: RequiresPermission<permission::GetPerson>) -> String {
        user.username.clone()
    }

    async fn delete_person(_: RequiresPermission<permission::DeletePerson>) -> &'static str {
        "deleted"
    }

    async fn admin_only(_: RequiresRole<role::Administrator>) -> &'static str {
        "admin"
    }

    #[tokio::test]
    async fn test_gate_statuses() {
        let state = create_test_state().await;
        create_test_account(&state, "alice", Some(RoleName::Teacher)).await;
        create_test_account(&state, "root", Some(RoleName::Administrator)).await;
        let alice = bearer(&state, "alice");
        let root = bearer(&state, "root");

        let app = Router::new()
            .route("/person", get(read_person).delete(delete_person))
            .route("/admin", get(admin_only))
            .with_state(state);
        let server = TestServer::new(app).unwrap();

        // anonymous
        server.get("/person").await.assert_status_unauthorized();
        server.get("/admin").await.assert_status_unauthorized();

        // authenticated, permission held
        let response = server.get("/person").add_header("authorization", alice.clone()).await;
        response.assert_status_ok();
        response.assert_text("alice");

        // authenticated, permission missing
        server
            .delete("/person")
            .add_header("authorization", alice.clone())
            .await
            .assert_status_forbidden();
        server.get("/admin").add_header("authorization", alice).await.assert_status_forbidden();

        server.delete("/person").add_header("authorization", root.clone()).await.assert_status_ok();
        server.get("/admin").add_header("authorization", root).await.assert_status_ok();
    }
}
