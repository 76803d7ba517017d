//! API request and response data models.
//!
//! These models define the public API contract and are distinct from the store records in
//! [`crate::db::models`]. All of them are annotated with `utoipa` for the generated docs.
//!
//! - [`auth`]: Login and password reset payloads
//! - [`users`]: Accounts, role assignment and the `/users/me` view
//! - [`roles`]: Roles and the permission catalog
//! - [`persons`]: Person records and their validation rules
//! - [`students`]: Student records, a person plus grade, section and school level

pub mod auth;
pub mod persons;
pub mod roles;
pub mod students;
pub mod users;
