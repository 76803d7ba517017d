//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything is mounted under `/api`:
//!
//! - **Authentication** (`/api/auth/*`): Login, forgot password, reset password
//! - **Users** (`/api/users/*`): The caller's own view, account creation, role assignment
//! - **Roles** (`/api/roles/*`, `/api/permissions`): Role administration and the permission catalog
//! - **Persons** (`/api/persons/*`): Person record CRUD
//! - **Students** (`/api/students/*`): Student record CRUD, administrators only
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa`. The document is served at
//! `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;
