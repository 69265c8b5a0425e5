//! Integration tests against the in-memory store.

mod cancellation;
mod support;
mod sweep;
