//! Common error types for token issuing and verification.
//!
//! This crate provides unified error handling across the token crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised across the token lifecycle.
///
/// Key errors happen at startup. Everything from `MalformedToken` down is
/// reachable from untrusted input and must only ever surface to a caller as
/// a generic denial (see [`ErrorResponse`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Key persistence failed: {0}")]
    KeyPersistence(String),

    #[error("Key load failed: {0}")]
    KeyLoad(String),

    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    #[error("Token signing failed: {0}")]
    SigningFailed(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token signature mismatch")]
    SignatureMismatch,

    #[error("Algorithm mismatch: expected {expected}, found {found}")]
    AlgorithmMismatch { expected: String, found: String },

    #[error("Token expired")]
    TokenExpired,

    #[error("Token not yet valid")]
    TokenNotYetValid,

    #[error("Invalid issuer")]
    InvalidIssuer,

    #[error("Invalid audience")]
    InvalidAudience,

    #[error("Insufficient scope: {0} required")]
    InsufficientScope(String),

    #[error("Invalid credentials")]
    InvalidCredentials,
}

impl AuthError {
    /// True for failures of the signature stage, including algorithm confusion.
    pub fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            Self::SignatureMismatch | Self::AlgorithmMismatch { .. }
        )
    }

    /// True for any failure a token can trigger on its way through
    /// verification and authorization.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken(_)
                | Self::SignatureMismatch
                | Self::AlgorithmMismatch { .. }
                | Self::TokenExpired
                | Self::TokenNotYetValid
                | Self::InvalidIssuer
                | Self::InvalidAudience
                | Self::InsufficientScope(_)
        )
    }
}

/// Error response for API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    /// Code shared by every verification and authorization failure.
    pub const DENIED: &'static str = "AUTH_DENIED";

    /// Create a new error response.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The single denial every rejected token collapses to.
    pub fn denied() -> Self {
        Self::new(Self::DENIED, "Access denied")
    }

    /// Whether this response is the generic denial.
    pub fn is_denied(&self) -> bool {
        self.code == Self::DENIED
    }
}

impl From<AuthError> for ErrorResponse {
    fn from(err: AuthError) -> Self {
        if err.is_verification_failure() || err == AuthError::InvalidCredentials {
            tracing::warn!(reason = %err, "Access denied");
            return Self::denied();
        }

        tracing::error!(reason = %err, "Token service failure");
        let (code, message) = match &err {
            AuthError::KeyGeneration(_) => ("AUTH_KEY_GENERATION_FAILED", "Failed to generate signing key"),
            AuthError::KeyPersistence(_) => ("AUTH_KEY_PERSISTENCE_FAILED", "Failed to persist signing key"),
            AuthError::KeyLoad(_) => ("AUTH_KEY_LOAD_FAILED", "Failed to load signing key"),
            AuthError::InvalidClaims(_) => ("AUTH_INVALID_CLAIMS", "Invalid token claims"),
            AuthError::SigningFailed(_) => ("AUTH_TOKEN_CREATION_FAILED", "Failed to create token"),
            _ => ("AUTH_INTERNAL", "Internal error"),
        };
        Self::new(code, message)
    }
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Auth(e) => e.into(),
            AppError::Internal(_) => Self::new("INTERNAL_ERROR", "Internal error"),
        }
    }
}
