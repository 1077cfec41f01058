//! Core library for Scaleboard.
//!
//! Contains the encrypted credential store, the upstream HTTP client, the
//! provider abstraction (REST API backed, plus a local control-plane stub)
//! with its factory, and the settings service that rotates credentials with a
//! validate-then-commit discipline. This crate depends on `scaleboard-storage`
//! for the document storage trait and knows nothing about HTTP routing.

pub mod client;
pub mod credentials;
pub mod crypto;
pub mod duration;
pub mod error;
pub mod preferences;
pub mod provider;
pub mod settings;
