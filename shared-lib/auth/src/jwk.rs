//! JSON Web Key set documents (RFC 7517).

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use error::AuthError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single JWK. RSA and P-256 EC members share the struct; absent members
/// are omitted on output.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    // RSA public
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    // EC public
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    // Private (d is shared by RSA and EC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,
}

impl Jwk {
    /// Whether this key carries private parameters.
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Copy of this key with every private member removed.
    pub fn to_public(&self) -> Self {
        Self {
            d: None,
            p: None,
            q: None,
            dp: None,
            dq: None,
            qi: None,
            ..self.clone()
        }
    }

    /// RFC 7638 thumbprint over the required public members.
    pub fn thumbprint(&self) -> Result<String, AuthError> {
        let canonical = match self.kty.as_str() {
            "RSA" => format!(
                r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#,
                self.member("e")?,
                self.member("n")?
            ),
            "EC" => format!(
                r#"{{"crv":"{}","kty":"EC","x":"{}","y":"{}"}}"#,
                self.member("crv")?,
                self.member("x")?,
                self.member("y")?
            ),
            other => return Err(AuthError::KeyLoad(format!("unsupported key type: {}", other))),
        };
        Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes())))
    }

    /// Raw bytes of a base64url member.
    pub fn decode_member(&self, name: &str) -> Result<Vec<u8>, AuthError> {
        let value = self.member(name)?;
        URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| AuthError::KeyLoad(format!("member {} is not base64url: {}", name, e)))
    }

    fn member(&self, name: &str) -> Result<&str, AuthError> {
        let value = match name {
            "n" => &self.n,
            "e" => &self.e,
            "crv" => &self.crv,
            "x" => &self.x,
            "y" => &self.y,
            "d" => &self.d,
            "p" => &self.p,
            "q" => &self.q,
            "dp" => &self.dp,
            "dq" => &self.dq,
            "qi" => &self.qi,
            _ => &None,
        };
        value
            .as_deref()
            .ok_or_else(|| AuthError::KeyLoad(format!("missing key member: {}", name)))
    }
}

/// Encode unsigned big-endian bytes as a JWK member.
pub(crate) fn encode_member(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

impl fmt::Debug for Jwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .field("private", &self.is_private())
            .finish_non_exhaustive()
    }
}

/// A JWK Set document: `{"keys": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Set holding a single key.
    pub fn single(key: Jwk) -> Self {
        Self { keys: vec![key] }
    }

    /// The first key of the set.
    pub fn first(&self) -> Result<&Jwk, AuthError> {
        self.keys
            .first()
            .ok_or_else(|| AuthError::KeyLoad("key set is empty".to_string()))
    }

    /// Parse a key set document.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        serde_json::from_str(json).map_err(|e| AuthError::KeyLoad(format!("invalid key set: {}", e)))
    }

    /// Pretty-printed key set document.
    pub fn to_json(&self) -> Result<String, AuthError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AuthError::KeyPersistence(format!("failed to encode key set: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Example key from RFC 7638 section 3.1.
    fn rfc7638_key() -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            n: Some(
                "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw"
                    .to_string(),
            ),
            e: Some("AQAB".to_string()),
            alg: Some("RS256".to_string()),
            kid: Some("2011-04-29".to_string()),
            ..Jwk::default()
        }
    }

    #[test]
    fn test_rfc7638_thumbprint() {
        assert_eq!(
            rfc7638_key().thumbprint().unwrap(),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }

    #[test]
    fn test_public_copy_drops_private_members() {
        let mut key = rfc7638_key();
        key.d = Some("c2VjcmV0".to_string());
        key.p = Some("cA".to_string());
        assert!(key.is_private());

        let public = key.to_public();
        assert!(!public.is_private());
        assert!(public.p.is_none());
        assert_eq!(public.n, key.n);
    }

    #[test]
    fn test_debug_hides_private_members() {
        let mut key = rfc7638_key();
        key.d = Some("super-secret-exponent".to_string());
        let printed = format!("{:?}", key);
        assert!(!printed.contains("super-secret-exponent"));
    }

    #[test]
    fn test_key_set_json_uses_standard_member_names() {
        let json = JwkSet::single(rfc7638_key()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let key = &value["keys"][0];
        assert_eq!(key["kty"], "RSA");
        assert_eq!(key["alg"], "RS256");
        assert_eq!(key["e"], "AQAB");
        assert!(key.get("d").is_none());
        assert!(key.get("use").is_none());
    }

    #[test]
    fn test_missing_member_is_load_failure() {
        let key = Jwk {
            kty: "RSA".to_string(),
            e: Some("AQAB".to_string()),
            ..Jwk::default()
        };
        assert!(matches!(key.thumbprint(), Err(AuthError::KeyLoad(_))));
        assert!(matches!(JwkSet::default().first(), Err(AuthError::KeyLoad(_))));
        assert!(matches!(JwkSet::from_json("{"), Err(AuthError::KeyLoad(_))));
    }
}
