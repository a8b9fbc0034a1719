//! Token signing.

use std::sync::Arc;

use error::AuthError;

use crate::claims::ClaimSet;
use crate::jwt::{encode_bytes, encode_segment, Header, Token, MAX_TOKEN_LEN, TOKEN_TYPE};
use crate::keys::Keypair;

/// Sign `claims` with `key`.
///
/// The header's `alg` and `kid` come from the key; there is no way to ask
/// for a different algorithm. A token longer than [`MAX_TOKEN_LEN`] is
/// refused, since no verifier would accept it.
pub fn sign(claims: &ClaimSet, key: &Keypair) -> Result<Token, AuthError> {
    claims.validate()?;

    let header = Header {
        alg: key.algorithm().as_str().to_string(),
        typ: Some(TOKEN_TYPE.to_string()),
        kid: Some(key.key_id().to_string()),
    };

    let header = encode_segment(&header).map_err(|e| {
        tracing::error!("Failed to encode token header: {}", e);
        AuthError::SigningFailed(e.to_string())
    })?;
    let payload = encode_segment(claims).map_err(|e| {
        tracing::error!("Failed to encode token claims: {}", e);
        AuthError::SigningFailed(e.to_string())
    })?;

    let signing_input = format!("{}.{}", header, payload);
    let signature = key.sign_bytes(signing_input.as_bytes()).map_err(|e| {
        tracing::error!("Failed to sign token: {}", e);
        e
    })?;

    let compact = format!("{}.{}", signing_input, encode_bytes(&signature));
    if compact.len() > MAX_TOKEN_LEN {
        tracing::error!(len = compact.len(), "Signed token exceeds {} bytes", MAX_TOKEN_LEN);
        return Err(AuthError::SigningFailed(format!(
            "token of {} bytes exceeds {} bytes",
            compact.len(),
            MAX_TOKEN_LEN
        )));
    }

    Ok(Token::new(compact))
}

/// A signer bound to one key.
#[derive(Debug, Clone)]
pub struct Signer {
    key: Arc<Keypair>,
}

impl Signer {
    pub fn new(key: Arc<Keypair>) -> Self {
        Self { key }
    }

    pub fn key_id(&self) -> &str {
        self.key.key_id()
    }

    /// Sign `claims` with the bound key.
    pub fn sign(&self, claims: &ClaimSet) -> Result<Token, AuthError> {
        sign(claims, &self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::ClaimsConfig;
    use crate::jwt::{decode_segment, Header};
    use crate::test_keys;
    use chrono::{DateTime, Utc};

    fn claims() -> ClaimSet {
        ClaimsConfig::default()
            .build(
                "user123",
                vec!["api:read".to_string()],
                DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn test_token_has_three_url_safe_parts() {
        let token = sign(&claims(), test_keys::rsa()).unwrap();
        let parts: Vec<&str> = token.as_str().split('.').collect();
        assert_eq!(parts.len(), 3);
        for part in parts {
            assert!(!part.is_empty());
            assert!(part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn test_header_bound_to_key() {
        for key in [test_keys::rsa(), test_keys::ec()] {
            let token = sign(&claims(), key).unwrap();
            let header_segment = token.as_str().split('.').next().unwrap();
            let header: Header = decode_segment(header_segment).unwrap();
            assert_eq!(header.alg, key.algorithm().as_str());
            assert_eq!(header.kid.as_deref(), Some(key.key_id()));
            assert_eq!(header.typ.as_deref(), Some("JWT"));
        }
    }

    #[test]
    fn test_payload_is_the_claim_set() {
        let claims = claims();
        let token = Signer::new(Arc::new(test_keys::ec().clone()))
            .sign(&claims)
            .unwrap();
        let payload_segment = token.as_str().split('.').nth(1).unwrap();
        let decoded: ClaimSet = decode_segment(payload_segment).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_refuses_inconsistent_claims() {
        let mut claims = claims();
        claims.exp = claims.iat;
        let result = sign(&claims, test_keys::rsa());
        assert!(matches!(result, Err(AuthError::InvalidClaims(_))));
    }

    #[test]
    fn test_refuses_oversized_token() {
        let mut claims = claims();
        claims.scopes = (0..400).map(|i| format!("api:resource{}:read", i)).collect();
        let result = sign(&claims, test_keys::ec());
        assert!(matches!(result, Err(AuthError::SigningFailed(_))));
    }
}
