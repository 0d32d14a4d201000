//! Cloudnote credential broker
//!
//! Issues short-lived presigned storage URLs scoped to a user's key prefix.
//! Re-exports the broker modules for use by the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod presign;
pub mod service;
pub mod store;

pub use error::BrokerError;
pub use service::Broker;

/// Shared application state
pub struct AppState {
    pub broker: Broker,
}
