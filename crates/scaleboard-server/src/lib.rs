//! Scaleboard HTTP server.
//!
//! Wires the core library and storage backend into an Axum application that
//! serves the JSON API under `/api` and, optionally, the dashboard frontend
//! at `/`.

pub mod app;
pub mod config;
pub mod error;
pub mod format;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;
