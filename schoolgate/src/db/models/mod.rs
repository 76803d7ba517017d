//! Records passed across the store boundary.
//!
//! These are distinct from the API models so storage and wire representations can change
//! independently. Requests are named `*DBRequest`, rows `*DBResponse`.

pub mod accounts;
pub mod password_reset_tokens;
pub mod persons;
pub mod roles;
pub mod students;
