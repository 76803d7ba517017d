//! HTTP request handlers for all API endpoints.
//!
//! # Handler Modules
//!
//! - [`auth`]: Login, forgot password and reset password
//! - [`users`]: Current caller, account creation and role assignment
//! - [`roles`]: Role CRUD, role-permission edits and the permission catalog
//! - [`persons`]: Person record CRUD
//! - [`students`]: Student record CRUD, administrators only
//!
//! # Authorization
//!
//! Handlers declare what they require with the extractors in [`crate::auth::permissions`].
//! Errors are returned as [`crate::errors::Error`], which maps onto status codes and a JSON
//! `{"message": ...}` body.

pub mod auth;
pub mod persons;
pub mod roles;
pub mod students;
pub mod users;
