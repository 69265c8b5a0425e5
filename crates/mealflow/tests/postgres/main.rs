//! Integration tests against PostgreSQL.
//!
//! Each test gets its own temporary database; see `support::db`.

mod store;
mod support;
