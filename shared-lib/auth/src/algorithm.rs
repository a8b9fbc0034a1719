//! Signing algorithms bound to keys.

use std::fmt;
use std::str::FromStr;

use error::AuthError;
use serde::{Deserialize, Serialize};

/// RSA modulus size used for every generated RS256 key.
pub const RSA_KEY_BITS: usize = 2048;

/// Signature algorithms a key can be bound to.
///
/// The algorithm is a property of the key. Tokens never choose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256 over a 2048-bit RSA key.
    #[serde(rename = "RS256")]
    Rs256,
    /// ECDSA over P-256 with SHA-256.
    #[serde(rename = "ES256")]
    Es256,
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Rs256
    }
}

impl Algorithm {
    /// The JOSE `alg` identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Es256 => "ES256",
        }
    }

    /// The JWK `kty` this algorithm requires.
    pub fn key_type(&self) -> &'static str {
        match self {
            Self::Rs256 => "RSA",
            Self::Es256 => "EC",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" => Ok(Self::Rs256),
            "ES256" => Ok(Self::Es256),
            other => Err(AuthError::KeyLoad(format!("unsupported algorithm: {}", other))),
        }
    }
}
