//! Signed, scoped access tokens.
//!
//! This crate covers the token lifecycle: key provisioning, claim
//! construction, signing, verification and scope-based authorization.
//!
//! ```text
//! identity + scopes -> ClaimsConfig::build -> sign -> Token
//! Token -> verify -> VerifiedClaims -> authorize -> Decision
//! ```

mod algorithm;
mod claims;
mod jwk;
mod jwt;
mod keys;
mod provider;
mod scope;
mod signer;
mod verifier;

pub use algorithm::{Algorithm, RSA_KEY_BITS};
pub use claims::{
    build, ClaimSet, ClaimsConfig, DEFAULT_AUDIENCE, DEFAULT_CLOCK_SKEW_SECS, DEFAULT_ISSUER,
    DEFAULT_TTL_SECS,
};
pub use jwk::{Jwk, JwkSet};
pub use jwt::{Header, Token, MAX_TOKEN_LEN};
pub use keys::{Keypair, PublicKey};
pub use provider::{
    generate, load_keypair, load_public, persist_private, persist_public, KeyProvider,
    PRIVATE_KEY_FILE, PUBLIC_KEY_FILE,
};
pub use scope::{authorize, Decision, API_READ, API_WRITE};
pub use signer::{sign, Signer};
pub use verifier::{verify, verify_with, Validation, Verifier, VerifiedClaims, DEFAULT_LEEWAY_SECS};

pub use error::AuthError;

/// Keys shared by the unit tests; RSA generation is too slow to repeat.
#[cfg(test)]
pub(crate) mod test_keys {
    use std::sync::OnceLock;

    use crate::{Algorithm, Keypair};

    fn cached(cell: &'static OnceLock<Keypair>, algorithm: Algorithm) -> &'static Keypair {
        cell.get_or_init(|| Keypair::generate(algorithm).expect("key generation"))
    }

    pub fn rsa() -> &'static Keypair {
        static KEY: OnceLock<Keypair> = OnceLock::new();
        cached(&KEY, Algorithm::Rs256)
    }

    pub fn ec() -> &'static Keypair {
        static KEY: OnceLock<Keypair> = OnceLock::new();
        cached(&KEY, Algorithm::Es256)
    }

    pub fn other_ec() -> &'static Keypair {
        static KEY: OnceLock<Keypair> = OnceLock::new();
        cached(&KEY, Algorithm::Es256)
    }
}
