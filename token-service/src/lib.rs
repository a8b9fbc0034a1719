//! Token Service
//!
//! Issues short-lived scoped access tokens for authenticated callers and
//! gates the protected API on them.

pub mod config;
pub mod keyring;
pub mod oracle;
pub mod service;

pub use config::TokenServiceConfig;
pub use keyring::{bootstrap_keys, ActiveKey};
pub use oracle::{AuthenticationOracle, Identity, StaticOracle};
pub use service::{AccessService, PROTECTED_PAYLOAD};
