//! Compact JWS serialization: `header.payload.signature`.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Upper bound on accepted token length.
pub const MAX_TOKEN_LEN: usize = 8 * 1024;

pub(crate) const TOKEN_TYPE: &str = "JWT";

/// Protected header.
///
/// `alg` stays a plain string so unknown or hostile values (`none`, `HS256`)
/// reach the algorithm check instead of failing as malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// A signed, compact-serialized access token.
///
/// Only the signer constructs these; input from the outside world is a
/// plain `&str` until the verifier has accepted it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub(crate) fn new(compact: String) -> Self {
        Self(compact)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Bearer material: keep it out of debug logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({} bytes)", self.0.len())
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

/// JSON-encode `value` and base64url it.
pub(crate) fn encode_segment<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}

/// Reverse of [`encode_segment`]. Any failure is reported as a message.
pub(crate) fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, String> {
    let bytes = decode_bytes(segment).map_err(|e| format!("invalid base64url: {}", e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("invalid JSON: {}", e))
}

pub(crate) fn encode_bytes(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn decode_bytes(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(segment)
}
