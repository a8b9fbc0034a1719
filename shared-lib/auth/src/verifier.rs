//! Token verification.
//!
//! A token moves through four stages, each its own type:
//!
//! 1. [`Parsed`]: three segments, decodable header. The payload is untouched.
//! 2. [`SignatureChecked`]: `alg` matches the key, signature verifies over
//!    `header.payload`. Only now is the payload decoded.
//! 3. [`TemporallyValid`]: `nbf`/`exp` hold at `now`, within the leeway.
//! 4. [`VerifiedClaims`]: issuer and audience policy applied.
//!
//! No stage can be built without the one before it, so claim content is never
//! looked at before the signature has been checked.

use std::ops::Deref;

use chrono::{DateTime, Duration, Utc};
use error::AuthError;

use crate::claims::ClaimSet;
use crate::jwt::{decode_bytes, decode_segment, Header, MAX_TOKEN_LEN};
use crate::keys::PublicKey;

/// Default symmetric leeway applied to `nbf` and `exp`, in seconds.
pub const DEFAULT_LEEWAY_SECS: i64 = 1;

/// Verification policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Clock skew tolerated on both ends of the validity window
    pub leeway: Duration,
    /// Required `iss`, if any
    pub issuer: Option<String>,
    /// Audience that must appear in `aud`, if any
    pub audience: Option<String>,
}

impl Default for Validation {
    fn default() -> Self {
        Self {
            leeway: Duration::seconds(DEFAULT_LEEWAY_SECS),
            issuer: None,
            audience: None,
        }
    }
}

impl Validation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the leeway.
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Require this issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Require this audience.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

/// A claim set that passed every verification stage.
///
/// Only the verifier can produce one; authorization takes nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims(ClaimSet);

impl VerifiedClaims {
    pub fn claims(&self) -> &ClaimSet {
        &self.0
    }
}

impl Deref for VerifiedClaims {
    type Target = ClaimSet;

    fn deref(&self) -> &ClaimSet {
        &self.0
    }
}

/// Structurally well-formed token.
struct Parsed<'a> {
    header: Header,
    signing_input: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> Parsed<'a> {
    fn parse(token: &'a str) -> Result<Self, AuthError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(AuthError::MalformedToken(format!(
                "token exceeds {} bytes",
                MAX_TOKEN_LEN
            )));
        }

        let mut parts = token.split('.');
        let (header, payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => {
                return Err(AuthError::MalformedToken(
                    "expected three dot-separated segments".to_string(),
                ))
            }
        };
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(AuthError::MalformedToken("empty segment".to_string()));
        }

        let decoded: Header = decode_segment(header)
            .map_err(|e| AuthError::MalformedToken(format!("header: {}", e)))?;

        Ok(Self {
            header: decoded,
            signing_input: &token[..header.len() + 1 + payload.len()],
            payload,
            signature,
        })
    }

    fn check_signature(self, key: &PublicKey) -> Result<SignatureChecked<'a>, AuthError> {
        let expected = key.algorithm().as_str();
        if self.header.alg != expected {
            return Err(AuthError::AlgorithmMismatch {
                expected: expected.to_string(),
                found: self.header.alg,
            });
        }
        if let Some(kid) = self.header.kid.as_deref() {
            if kid != key.key_id() {
                return Err(AuthError::SignatureMismatch);
            }
        }

        let signature = decode_bytes(self.signature).map_err(|_| AuthError::SignatureMismatch)?;
        if !key.verify_bytes(self.signing_input.as_bytes(), &signature) {
            return Err(AuthError::SignatureMismatch);
        }

        Ok(SignatureChecked {
            payload: self.payload,
        })
    }
}

/// Token whose signature matches the key.
struct SignatureChecked<'a> {
    payload: &'a str,
}

impl SignatureChecked<'_> {
    fn decode(self) -> Result<ClaimSet, AuthError> {
        decode_segment(self.payload).map_err(|e| AuthError::MalformedToken(format!("payload: {}", e)))
    }
}

/// Authentic claims inside their validity window.
struct TemporallyValid(ClaimSet);

impl TemporallyValid {
    fn check(claims: ClaimSet, now: DateTime<Utc>, leeway: Duration) -> Result<Self, AuthError> {
        let now = now.timestamp();
        let leeway = leeway.num_seconds();

        if now > claims.exp.saturating_add(leeway) {
            return Err(AuthError::TokenExpired);
        }
        if now < claims.nbf.saturating_sub(leeway) {
            return Err(AuthError::TokenNotYetValid);
        }
        Ok(Self(claims))
    }

    fn accept(self, validation: &Validation) -> Result<VerifiedClaims, AuthError> {
        if let Some(issuer) = validation.issuer.as_deref() {
            if self.0.iss != issuer {
                return Err(AuthError::InvalidIssuer);
            }
        }
        if let Some(audience) = validation.audience.as_deref() {
            if !self.0.has_audience(audience) {
                return Err(AuthError::InvalidAudience);
            }
        }
        Ok(VerifiedClaims(self.0))
    }
}

/// Verify `token` against `key` at `now` with the default policy.
pub fn verify(token: &str, key: &PublicKey, now: DateTime<Utc>) -> Result<VerifiedClaims, AuthError> {
    verify_with(token, key, now, &Validation::default())
}

/// Verify `token` against `key` at `now` with an explicit policy.
pub fn verify_with(
    token: &str,
    key: &PublicKey,
    now: DateTime<Utc>,
    validation: &Validation,
) -> Result<VerifiedClaims, AuthError> {
    let result = Parsed::parse(token)
        .and_then(|parsed| parsed.check_signature(key))
        .and_then(SignatureChecked::decode)
        .and_then(|claims| TemporallyValid::check(claims, now, validation.leeway))
        .and_then(|valid| valid.accept(validation));

    if let Err(e) = &result {
        tracing::warn!(kid = %key.key_id(), "Token rejected: {}", e);
    }
    result
}

/// A verifier bound to one public key and policy.
#[derive(Debug, Clone)]
pub struct Verifier {
    key: PublicKey,
    validation: Validation,
}

impl Verifier {
    pub fn new(key: PublicKey) -> Self {
        Self {
            key,
            validation: Validation::default(),
        }
    }

    /// Replace the verification policy.
    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    /// Verify `token` against the current time.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify `token` as of `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedClaims, AuthError> {
        verify_with(token, &self.key, now, &self.validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::ClaimsConfig;
    use crate::jwt::{encode_bytes, encode_segment};
    use crate::signer::sign;
    use crate::test_keys;

    const NOW: i64 = 1_700_000_000;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn claims() -> ClaimSet {
        ClaimsConfig::default()
            .build("user123", vec!["api:read".to_string()], at(NOW))
            .unwrap()
    }

    #[test]
    fn test_accepts_valid_token() {
        let claims = claims();
        let token = sign(&claims, test_keys::rsa()).unwrap();
        let verified = verify(token.as_str(), test_keys::rsa().public_key(), at(NOW)).unwrap();
        assert_eq!(verified.claims(), &claims);
        assert_eq!(verified.sub, "user123");
    }

    #[test]
    fn test_rejects_wrong_key_of_same_algorithm() {
        let token = sign(&claims(), test_keys::ec()).unwrap();
        let result = verify(token.as_str(), test_keys::other_ec().public_key(), at(NOW));
        assert!(matches!(result, Err(AuthError::SignatureMismatch)));
    }

    #[test]
    fn test_bad_signature_checked_before_expiry() {
        let token = sign(&claims(), test_keys::ec()).unwrap();
        let far_future = at(NOW + 10 * 3600);
        let result = verify(token.as_str(), test_keys::other_ec().public_key(), far_future);
        assert!(matches!(result, Err(AuthError::SignatureMismatch)));
    }

    #[test]
    fn test_garbage_payload_behind_valid_header_is_a_signature_failure() {
        let token = sign(&claims(), test_keys::ec()).unwrap();
        let mut parts: Vec<&str> = token.as_str().split('.').collect();
        parts[1] = "!!not-base64!!";
        let forged = parts.join(".");
        let result = verify(&forged, test_keys::ec().public_key(), at(NOW));
        assert!(matches!(result, Err(AuthError::SignatureMismatch)));
    }

    #[test]
    fn test_rejects_alg_none() {
        let header = encode_segment(&Header {
            alg: "none".to_string(),
            typ: Some("JWT".to_string()),
            kid: None,
        })
        .unwrap();
        let payload = encode_segment(&claims()).unwrap();
        let forged = format!("{}.{}.{}", header, payload, encode_bytes(b"x"));

        let result = verify(&forged, test_keys::rsa().public_key(), at(NOW));
        assert!(matches!(result, Err(AuthError::AlgorithmMismatch { .. })));
    }

    #[test]
    fn test_rejects_foreign_kid() {
        let token = sign(&claims(), test_keys::ec()).unwrap();
        let mut parts: Vec<String> = token.as_str().split('.').map(String::from).collect();
        parts[0] = encode_segment(&Header {
            alg: "ES256".to_string(),
            typ: Some("JWT".to_string()),
            kid: Some("unknown".to_string()),
        })
        .unwrap();
        let result = verify(&parts.join("."), test_keys::ec().public_key(), at(NOW));
        assert!(matches!(result, Err(AuthError::SignatureMismatch)));
    }

    #[test]
    fn test_malformed_inputs() {
        let key = test_keys::rsa().public_key();
        for input in ["", "abc", "a.b", "a.b.c.d", "..", "a..c", "***.b.c"] {
            let result = verify(input, key, at(NOW));
            assert!(
                matches!(result, Err(AuthError::MalformedToken(_))),
                "{:?} gave {:?}",
                input,
                result
            );
        }

        let oversized = "a".repeat(MAX_TOKEN_LEN + 1);
        assert!(matches!(
            verify(&oversized, key, at(NOW)),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_issuer_and_audience_policy() {
        let claims = claims();
        let token = sign(&claims, test_keys::ec()).unwrap();
        let key = test_keys::ec().public_key().clone();

        let ok = Verifier::new(key.clone()).with_validation(
            Validation::new()
                .with_issuer("local-issuer")
                .with_audience("mobileApp"),
        );
        assert!(ok.verify_at(token.as_str(), at(NOW)).is_ok());

        let wrong_issuer = Verifier::new(key.clone()).with_validation(Validation::new().with_issuer("elsewhere"));
        assert_eq!(
            wrong_issuer.verify_at(token.as_str(), at(NOW)),
            Err(AuthError::InvalidIssuer)
        );

        let wrong_audience = Verifier::new(key).with_validation(Validation::new().with_audience("webApp"));
        assert_eq!(
            wrong_audience.verify_at(token.as_str(), at(NOW)),
            Err(AuthError::InvalidAudience)
        );
    }

    #[test]
    fn test_zero_leeway() {
        let claims = claims();
        let token = sign(&claims, test_keys::ec()).unwrap();
        let strict = Verifier::new(test_keys::ec().public_key().clone())
            .with_validation(Validation::new().with_leeway(Duration::zero()));

        assert!(strict.verify_at(token.as_str(), at(claims.exp)).is_ok());
        assert_eq!(
            strict.verify_at(token.as_str(), at(claims.exp + 1)),
            Err(AuthError::TokenExpired)
        );
        assert!(strict.verify_at(token.as_str(), at(claims.nbf)).is_ok());
        assert_eq!(
            strict.verify_at(token.as_str(), at(claims.nbf - 1)),
            Err(AuthError::TokenNotYetValid)
        );
    }
}
