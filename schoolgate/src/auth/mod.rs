//! Authentication and authorization core.
//!
//! # Request flow
//!
//! 1. `POST /api/auth/login` verifies a username and password against the stored Argon2 hash
//!    and returns a signed bearer token whose only claims are `{sub, iat, exp}`.
//! 2. Every later request runs through [`middleware::authenticate_request`]. No header means an
//!    anonymous caller; a malformed, expired or orphaned token is rejected with 401.
//! 3. For a valid token the account is loaded and its authorities are derived from the
//!    account's role and that role's current permissions ([`authorities`]). Nothing about roles
//!    or permissions is trusted from the token.
//! 4. Handlers state their requirement with [`permissions::RequiresPermission`] or
//!    [`permissions::RequiresRole`]: anonymous callers get 401, callers without the authority 403.
//!
//! # Modules
//!
//! - [`authorities`]: Role-permission resolution
//! - [`current_user`]: Bearer token authentication and the [`current_user::CurrentUser`] extractor
//! - [`middleware`]: Per-request authentication middleware
//! - [`password`]: Password hashing and verification using Argon2, reset token generation
//! - [`permissions`]: Authorization gate extractors
//! - [`token`]: JWT issuing and validation

pub mod authorities;
pub mod current_user;
pub mod middleware;
pub mod password;
pub mod permissions;
pub mod token;
