//! Role-permission resolution.
//!
//! An account's authorities are derived from the store on every request: one role authority
//! per role held, plus one permission authority per permission attached to those roles.
//! Nothing is cached and nothing is read from the bearer token, so revoking a permission from
//! a role takes effect on the caller's next request.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{instrument, warn};

use crate::db::errors::Result;
use crate::db::models::accounts::{AccountDBResponse, RoleGrant};
use crate::db::store::AccountStore;
use crate::types::{PermissionName, RoleName, abbrev_uuid};

/// A resolved role-tag or permission-tag granted to an authenticated identity for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Authority {
    Role(RoleName),
    Permission(PermissionName),
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Role(role) => write!(f, "ROLE:{role}"),
            Authority::Permission(permission) => write!(f, "PERMISSION:{permission}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthoritySet(BTreeSet<Authority>);

impl AuthoritySet {
    /// Union of every grant. With the single-role rule honoured there is exactly one grant.
    pub fn from_grants(grants: &[RoleGrant]) -> Self {
        let mut set = BTreeSet::new();
        for grant in grants {
            set.insert(Authority::Role(grant.role));
            set.extend(grant.permissions.iter().copied().map(Authority::Permission));
        }
        Self(set)
    }

    pub fn contains(&self, authority: Authority) -> bool {
        self.0.contains(&authority)
    }

    pub fn has_role(&self, role: RoleName) -> bool {
        self.contains(Authority::Role(role))
    }

    pub fn has_permission(&self, permission: PermissionName) -> bool {
        self.contains(Authority::Permission(permission))
    }

    pub fn roles(&self) -> Vec<RoleName> {
        self.0
            .iter()
            .filter_map(|a| match a {
                Authority::Role(role) => Some(*role),
                Authority::Permission(_) => None,
            })
            .collect()
    }

    pub fn permissions(&self) -> Vec<PermissionName> {
        self.0
            .iter()
            .filter_map(|a| match a {
                Authority::Permission(permission) => Some(*permission),
                Authority::Role(_) => None,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Authority> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Expand an account's roles into its current authority set.
///
/// An account holding more than one role is a data drift condition: it is logged and the union
/// of all roles is granted.
#[instrument(skip(store, account), fields(account_id = %abbrev_uuid(&account.id)), err)]
pub async fn resolve_authorities<S>(store: &S, account: &AccountDBResponse) -> Result<AuthoritySet>
where
    S: AccountStore + ?Sized,
{
    let grants = store.account_grants(account.id).await?;
    if grants.len() > 1 {
        let roles: Vec<RoleName> = grants.iter().map(|g| g.role).collect();
        warn!(
            username = %account.username,
            roles = ?roles,
            "account holds more than one role, granting the union of all of them"
        );
    }
    Ok(AuthoritySet::from_grants(&grants))
}
