//! Token claim sets and the builder that stamps their validity window.

use chrono::{DateTime, Duration, Utc};
use error::AuthError;
use serde::{Deserialize, Deserializer, Serialize};

/// Issuer used when none is configured.
pub const DEFAULT_ISSUER: &str = "local-issuer";
/// Audience used when none is configured.
pub const DEFAULT_AUDIENCE: &str = "mobileApp";
/// Default validity window of an issued token, in seconds.
pub const DEFAULT_TTL_SECS: i64 = 30 * 60;
/// Default backdating of `nbf` to absorb issuer/verifier clock drift, in seconds.
pub const DEFAULT_CLOCK_SKEW_SECS: i64 = 5;

/// Claims carried by an access token.
///
/// Timestamps are seconds since the Unix epoch.
/// Invariant: `nbf <= iat < exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Issuer
    pub iss: String,
    /// Subject (user ID)
    pub sub: String,
    /// Intended consumers
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    /// Issued at
    pub iat: i64,
    /// Not before
    pub nbf: i64,
    /// Expiration time
    pub exp: i64,
    /// Granted scopes, in grant order
    pub scopes: Vec<String>,
}

impl ClaimSet {
    /// Check the structural invariants of the claim set.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.iss.is_empty() {
            return Err(AuthError::InvalidClaims("issuer must not be empty".to_string()));
        }
        if self.sub.is_empty() {
            return Err(AuthError::InvalidClaims("subject must not be empty".to_string()));
        }
        if self.aud.is_empty() {
            return Err(AuthError::InvalidClaims("audience must not be empty".to_string()));
        }
        if self.nbf > self.iat || self.iat >= self.exp {
            return Err(AuthError::InvalidClaims(format!(
                "expected nbf <= iat < exp, got nbf={} iat={} exp={}",
                self.nbf, self.iat, self.exp
            )));
        }
        Ok(())
    }

    /// Whether `scope` was granted (exact match).
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Whether `audience` is one of the intended consumers.
    pub fn has_audience(&self, audience: &str) -> bool {
        self.aud.iter().any(|a| a == audience)
    }
}

/// `aud` may be a single string or an array of strings.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(aud) => aud,
    })
}

/// Issuer-side claim settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsConfig {
    /// Token issuer
    pub issuer: String,
    /// Audience stamped into every token
    pub audience: Vec<String>,
    /// Token validity duration
    pub ttl: Duration,
    /// How far `nbf` is backdated from `iat`
    pub clock_skew: Duration,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            audience: vec![DEFAULT_AUDIENCE.to_string()],
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            clock_skew: Duration::seconds(DEFAULT_CLOCK_SKEW_SECS),
        }
    }
}

impl ClaimsConfig {
    /// Create a claims configuration with the default ttl and clock skew.
    pub fn new(issuer: impl Into<String>, audience: Vec<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience,
            ..Self::default()
        }
    }

    /// Set the token validity duration.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the clock skew allowance.
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// Build the claims for `subject` issued at `now`.
    pub fn build(
        &self,
        subject: impl Into<String>,
        scopes: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<ClaimSet, AuthError> {
        if self.ttl <= Duration::zero() {
            return Err(AuthError::InvalidClaims(format!(
                "ttl must be positive, got {}s",
                self.ttl.num_seconds()
            )));
        }
        if self.clock_skew < Duration::zero() {
            return Err(AuthError::InvalidClaims(format!(
                "clock skew must not be negative, got {}s",
                self.clock_skew.num_seconds()
            )));
        }

        let now = now.timestamp();
        let claims = ClaimSet {
            iss: self.issuer.clone(),
            sub: subject.into(),
            aud: self.audience.clone(),
            iat: now,
            nbf: now - self.clock_skew.num_seconds(),
            exp: now + self.ttl.num_seconds(),
            scopes,
        };
        claims.validate()?;
        Ok(claims)
    }
}

/// Build claims with the default audience and clock skew.
pub fn build(
    issuer: impl Into<String>,
    subject: impl Into<String>,
    scopes: Vec<String>,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<ClaimSet, AuthError> {
    ClaimsConfig::new(issuer, vec![DEFAULT_AUDIENCE.to_string()])
        .with_ttl(ttl)
        .build(subject, scopes, now)
}
