//! Authentication oracle seam.
//!
//! Checking credentials belongs to an external identity system. The service
//! only needs to know who the caller is and which scopes they were granted.

use std::collections::HashMap;

use auth::AuthError;
use serde::{Deserialize, Serialize};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque internal user ID
    pub user_id: String,
    /// Scopes granted to the user
    pub scopes: Vec<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            scopes,
        }
    }
}

/// Resolves a credential to an identity.
pub trait AuthenticationOracle: Send + Sync {
    /// Authenticate `credential`, or fail with `InvalidCredentials`.
    fn authenticate(&self, credential: &str) -> Result<Identity, AuthError>;
}

/// Fixed credential table for development and testing
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    users: HashMap<String, Identity>,
    fallback: Option<String>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `credential` as `user_id` with `scopes`.
    pub fn with_user(mut self, credential: impl Into<String>, user_id: impl Into<String>, scopes: &[&str]) -> Self {
        let scopes = scopes.iter().map(|s| s.to_string()).collect();
        self.users
            .insert(credential.into(), Identity::new(user_id, scopes));
        self
    }

    /// Authenticate unknown credentials as `user_id` with no scopes instead of
    /// rejecting them.
    pub fn with_unscoped_fallback(mut self, user_id: impl Into<String>) -> Self {
        self.fallback = Some(user_id.into());
        self
    }
}

impl AuthenticationOracle for StaticOracle {
    fn authenticate(&self, credential: &str) -> Result<Identity, AuthError> {
        if let Some(identity) = self.users.get(credential) {
            return Ok(identity.clone());
        }

        match &self.fallback {
            Some(user_id) => Ok(Identity::new(user_id.clone(), Vec::new())),
            None => {
                tracing::warn!("Unknown credential");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}
