//! Persistence layer.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, auth core)
//! └──────┬──────┘
//!        │  Arc<dyn Store>
//!        ↓
//! ┌─────────────┐
//! │ Store traits│  (db::store - accounts, roles, permissions, reset tokens, persons, students)
//! └──────┬──────┘
//!        │
//!   ┌────┴─────────────┐
//!   ↓                  ↓
//! ┌──────────┐   ┌──────────────┐
//! │ PgStore  │   │ InMemoryStore│
//! └──────────┘   └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`store`]: The store traits handlers depend on
//! - [`postgres`]: PostgreSQL implementation, migrated on startup
//! - [`in_memory`]: Process-local implementation for tests and local runs
//! - [`models`]: Records passed across the store boundary
//! - [`errors`]: Store error type

pub mod errors;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod store;
