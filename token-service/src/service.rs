//! Access service
//!
//! Composes the token pipelines:
//! credential -> oracle -> claims -> signed token, and
//! token -> verified claims -> scope decision -> protected resource.

use std::sync::Arc;

use auth::{authorize, AuthError, ClaimsConfig, Token, Validation, VerifiedClaims};
use chrono::{DateTime, Utc};
use error::ErrorResponse;

use crate::config::TokenServiceConfig;
use crate::keyring::ActiveKey;
use crate::oracle::{AuthenticationOracle, Identity};

/// Payload returned by the protected API.
pub const PROTECTED_PAYLOAD: &str = "api data";

/// Issues tokens and gates the protected API on them.
#[derive(Clone)]
pub struct AccessService {
    oracle: Arc<dyn AuthenticationOracle>,
    keys: Arc<ActiveKey>,
    claims: ClaimsConfig,
    validation: Validation,
}

impl AccessService {
    /// Create a service with explicit claim and verification settings.
    pub fn new(
        oracle: Arc<dyn AuthenticationOracle>,
        keys: Arc<ActiveKey>,
        claims: ClaimsConfig,
        validation: Validation,
    ) -> Self {
        Self {
            oracle,
            keys,
            claims,
            validation,
        }
    }

    /// Create a service using the claim and verification settings of `config`.
    pub fn from_config(
        config: &TokenServiceConfig,
        oracle: Arc<dyn AuthenticationOracle>,
        keys: Arc<ActiveKey>,
    ) -> Self {
        Self::new(oracle, keys, config.claims_config(), config.validation())
    }

    pub fn keys(&self) -> &ActiveKey {
        &self.keys
    }

    /// Authenticate `credential` and issue a token for the resulting identity.
    pub fn issue_token(&self, credential: &str) -> Result<Token, AuthError> {
        self.issue_token_at(credential, Utc::now())
    }

    pub fn issue_token_at(&self, credential: &str, now: DateTime<Utc>) -> Result<Token, AuthError> {
        let identity = self.oracle.authenticate(credential)?;
        self.issue_for(&identity, now)
    }

    /// Issue a token for an already authenticated identity.
    pub fn issue_for(&self, identity: &Identity, now: DateTime<Utc>) -> Result<Token, AuthError> {
        let claims = self
            .claims
            .build(identity.user_id.clone(), identity.scopes.clone(), now)?;
        let token = self.keys.signer().sign(&claims)?;

        tracing::info!(
            sub = %claims.sub,
            scopes = ?claims.scopes,
            exp = claims.exp,
            "Issued access token"
        );
        Ok(token)
    }

    /// Verify `token` against the active key.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedClaims, AuthError> {
        let key = self.keys.public_key();
        auth::verify_with(token, &key, now, &self.validation)
    }

    /// Verify `token` and require `required_scope`.
    pub fn authorize(&self, token: &str, required_scope: &str) -> Result<VerifiedClaims, AuthError> {
        self.authorize_at(token, required_scope, Utc::now())
    }

    pub fn authorize_at(
        &self,
        token: &str,
        required_scope: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedClaims, AuthError> {
        let claims = self.verify_at(token, now)?;
        authorize(&claims, required_scope).into_result()?;
        Ok(claims)
    }

    /// Decision point of the protected API.
    ///
    /// Every failure collapses into the same generic denial; the specific
    /// reason is logged, never returned.
    pub fn call_protected(&self, token: &str, required_scope: &str) -> Result<String, ErrorResponse> {
        self.call_protected_at(token, required_scope, Utc::now())
    }

    pub fn call_protected_at(
        &self,
        token: &str,
        required_scope: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ErrorResponse> {
        match self.authorize_at(token, required_scope, now) {
            Ok(claims) => {
                tracing::info!(sub = %claims.sub, scope = required_scope, "Access granted");
                Ok(PROTECTED_PAYLOAD.to_string())
            }
            Err(e) => {
                tracing::warn!(scope = required_scope, "Access denied: {}", e);
                Err(ErrorResponse::denied())
            }
        }
    }
}
