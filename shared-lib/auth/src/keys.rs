//! Asymmetric signing keys.
//!
//! A [`Keypair`] never leaves the issuing process. Verifiers only ever get a
//! [`PublicKey`], which carries no private material.

use std::fmt;

use error::AuthError;
use p256::ecdsa::{
    Signature as EcSignature, SigningKey as EcSigningKey, VerifyingKey as EcVerifyingKey,
};
use rand::rngs::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::algorithm::{Algorithm, RSA_KEY_BITS};
use crate::jwk::{encode_member, Jwk};

const P256_CURVE: &str = "P-256";
const P256_COORDINATE_LEN: usize = 32;
const KEY_USE_SIG: &str = "sig";

#[derive(Clone)]
enum PublicMaterial {
    Rsa(RsaPublicKey),
    Ec(EcVerifyingKey),
}

#[derive(Clone)]
enum PrivateMaterial {
    Rsa(RsaPrivateKey),
    Ec(EcSigningKey),
}

/// The distributable half of a signing key.
#[derive(Clone)]
pub struct PublicKey {
    algorithm: Algorithm,
    kid: String,
    material: PublicMaterial,
}

impl PublicKey {
    fn from_material(algorithm: Algorithm, material: PublicMaterial) -> Result<Self, AuthError> {
        let kid = public_members(&material).thumbprint()?;
        Ok(Self {
            algorithm,
            kid,
            material,
        })
    }

    /// Algorithm every token verified with this key must declare.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// RFC 7638 thumbprint identifying this key.
    pub fn key_id(&self) -> &str {
        &self.kid
    }

    /// Public JWK tagged with `kid`, `use` and `alg`.
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kid: Some(self.kid.clone()),
            key_use: Some(KEY_USE_SIG.to_string()),
            alg: Some(self.algorithm.as_str().to_string()),
            ..public_members(&self.material)
        }
    }

    /// Read the public members of a JWK. Private members, if any, are ignored.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, AuthError> {
        let algorithm = resolve_algorithm(jwk)?;
        let material = match algorithm {
            Algorithm::Rs256 => {
                let n = BigUint::from_bytes_be(&jwk.decode_member("n")?);
                let e = BigUint::from_bytes_be(&jwk.decode_member("e")?);
                let key = RsaPublicKey::new(n, e)
                    .map_err(|e| AuthError::KeyLoad(format!("invalid RSA public key: {}", e)))?;
                check_rsa_strength(key.size())?;
                PublicMaterial::Rsa(key)
            }
            Algorithm::Es256 => {
                let x = jwk.decode_member("x")?;
                let y = jwk.decode_member("y")?;
                if x.len() != P256_COORDINATE_LEN || y.len() != P256_COORDINATE_LEN {
                    return Err(AuthError::KeyLoad("invalid P-256 coordinate length".to_string()));
                }
                let mut sec1 = Vec::with_capacity(1 + 2 * P256_COORDINATE_LEN);
                sec1.push(0x04);
                sec1.extend_from_slice(&x);
                sec1.extend_from_slice(&y);
                let key = EcVerifyingKey::from_sec1_bytes(&sec1)
                    .map_err(|e| AuthError::KeyLoad(format!("invalid P-256 public key: {}", e)))?;
                PublicMaterial::Ec(key)
            }
        };

        let key = Self::from_material(algorithm, material)?;
        check_stored_kid(jwk, &key.kid)?;
        Ok(key)
    }

    /// Check `signature` over `message`. Never errors; any failure is `false`.
    pub(crate) fn verify_bytes(&self, message: &[u8], signature: &[u8]) -> bool {
        match &self.material {
            PublicMaterial::Rsa(key) => {
                let digest = Sha256::digest(message);
                key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
                    .is_ok()
            }
            PublicMaterial::Ec(key) => {
                use p256::ecdsa::signature::Verifier;

                match EcSignature::from_slice(signature) {
                    Ok(signature) => key.verify(message, &signature).is_ok(),
                    Err(_) => false,
                }
            }
        }
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.kid == other.kid
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm)
            .field("kid", &self.kid)
            .finish()
    }
}

/// A signing key with its public half.
#[derive(Clone)]
pub struct Keypair {
    private: PrivateMaterial,
    public: PublicKey,
}

impl Keypair {
    /// Generate a fresh key from the operating system's CSPRNG.
    ///
    /// RS256 keys have a 2048-bit modulus; ES256 keys live on P-256.
    pub fn generate(algorithm: Algorithm) -> Result<Self, AuthError> {
        let (private, public) = match algorithm {
            Algorithm::Rs256 => {
                let key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
                    .map_err(|e| AuthError::KeyGeneration(e.to_string()))?;
                let public = key.to_public_key();
                (PrivateMaterial::Rsa(key), PublicMaterial::Rsa(public))
            }
            Algorithm::Es256 => {
                let key = EcSigningKey::random(&mut OsRng);
                let public = EcVerifyingKey::from(&key);
                (PrivateMaterial::Ec(key), PublicMaterial::Ec(public))
            }
        };

        let public = PublicKey::from_material(algorithm, public)
            .map_err(|e| AuthError::KeyGeneration(e.to_string()))?;
        tracing::info!(alg = %algorithm, kid = %public.kid, "Generated signing key");
        Ok(Self { private, public })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.public.algorithm
    }

    pub fn key_id(&self) -> &str {
        &self.public.kid
    }

    /// The verifier's view of this key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Public JWK, identical to `public_key().to_jwk()`.
    pub fn to_public_jwk(&self) -> Jwk {
        self.public.to_jwk()
    }

    /// Private JWK including the public members and, for RSA, the CRT
    /// parameters.
    pub fn to_private_jwk(&self) -> Result<Jwk, AuthError> {
        let mut jwk = self.public.to_jwk();
        match &self.private {
            PrivateMaterial::Rsa(key) => {
                let primes = key.primes();
                if primes.len() != 2 {
                    return Err(AuthError::KeyPersistence(
                        "only two-prime RSA keys can be exported".to_string(),
                    ));
                }
                let missing_crt =
                    || AuthError::KeyPersistence("RSA CRT parameters unavailable".to_string());
                let dp = key.dp().ok_or_else(missing_crt)?;
                let dq = key.dq().ok_or_else(missing_crt)?;
                let qinv = key.qinv().ok_or_else(missing_crt)?;

                jwk.d = Some(encode_member(&key.d().to_bytes_be()));
                jwk.p = Some(encode_member(&primes[0].to_bytes_be()));
                jwk.q = Some(encode_member(&primes[1].to_bytes_be()));
                jwk.dp = Some(encode_member(&dp.to_bytes_be()));
                jwk.dq = Some(encode_member(&dq.to_bytes_be()));
                jwk.qi = Some(encode_member(&qinv.to_bytes_be().1));
            }
            PrivateMaterial::Ec(key) => {
                jwk.d = Some(encode_member(key.to_bytes().as_slice()));
            }
        }
        Ok(jwk)
    }

    /// Rebuild a keypair from a private JWK, re-validating the key material.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, AuthError> {
        if !jwk.is_private() {
            return Err(AuthError::KeyLoad("key set holds no private key".to_string()));
        }

        let algorithm = resolve_algorithm(jwk)?;
        let (private, public) = match algorithm {
            Algorithm::Rs256 => {
                let member = |name: &str| -> Result<BigUint, AuthError> {
                    Ok(BigUint::from_bytes_be(&jwk.decode_member(name)?))
                };
                let key = RsaPrivateKey::from_components(
                    member("n")?,
                    member("e")?,
                    member("d")?,
                    vec![member("p")?, member("q")?],
                )
                .map_err(|e| AuthError::KeyLoad(format!("invalid RSA private key: {}", e)))?;
                key.validate()
                    .map_err(|e| AuthError::KeyLoad(format!("inconsistent RSA private key: {}", e)))?;
                check_rsa_strength(key.size())?;
                let public = key.to_public_key();
                (PrivateMaterial::Rsa(key), PublicMaterial::Rsa(public))
            }
            Algorithm::Es256 => {
                let key = EcSigningKey::from_slice(&jwk.decode_member("d")?)
                    .map_err(|e| AuthError::KeyLoad(format!("invalid P-256 private key: {}", e)))?;
                let public = EcVerifyingKey::from(&key);
                (PrivateMaterial::Ec(key), PublicMaterial::Ec(public))
            }
        };

        let public = PublicKey::from_material(algorithm, public)?;
        let stored_public = jwk.to_public();
        if stored_public.thumbprint().ok().as_deref() != Some(public.key_id()) {
            return Err(AuthError::KeyLoad(
                "public members do not match the private key".to_string(),
            ));
        }
        check_stored_kid(jwk, &public.kid)?;

        Ok(Self { private, public })
    }

    /// Sign `message` with the algorithm bound to this key.
    pub(crate) fn sign_bytes(&self, message: &[u8]) -> Result<Vec<u8>, AuthError> {
        match &self.private {
            PrivateMaterial::Rsa(key) => {
                let digest = Sha256::digest(message);
                key.sign_with_rng(&mut OsRng, Pkcs1v15Sign::new::<Sha256>(), &digest)
                    .map_err(|e| AuthError::SigningFailed(e.to_string()))
            }
            PrivateMaterial::Ec(key) => {
                use p256::ecdsa::signature::Signer;

                let signature: EcSignature = key
                    .try_sign(message)
                    .map_err(|e| AuthError::SigningFailed(e.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("algorithm", &self.public.algorithm)
            .field("kid", &self.public.kid)
            .finish_non_exhaustive()
    }
}

fn public_members(material: &PublicMaterial) -> Jwk {
    match material {
        PublicMaterial::Rsa(key) => Jwk {
            kty: "RSA".to_string(),
            n: Some(encode_member(&key.n().to_bytes_be())),
            e: Some(encode_member(&key.e().to_bytes_be())),
            ..Jwk::default()
        },
        PublicMaterial::Ec(key) => {
            let point = key.to_encoded_point(false);
            Jwk {
                kty: "EC".to_string(),
                crv: Some(P256_CURVE.to_string()),
                x: point.x().map(|x| encode_member(x.as_slice())),
                y: point.y().map(|y| encode_member(y.as_slice())),
                ..Jwk::default()
            }
        }
    }
}

/// The key's algorithm from `alg`, falling back to the only algorithm its
/// `kty` supports. `alg` and `kty` must agree.
fn resolve_algorithm(jwk: &Jwk) -> Result<Algorithm, AuthError> {
    let algorithm = match jwk.alg.as_deref() {
        Some(alg) => alg.parse::<Algorithm>()?,
        None => match jwk.kty.as_str() {
            "RSA" => Algorithm::Rs256,
            "EC" => Algorithm::Es256,
            other => return Err(AuthError::KeyLoad(format!("unsupported key type: {}", other))),
        },
    };

    if jwk.kty != algorithm.key_type() {
        return Err(AuthError::KeyLoad(format!(
            "key type {} cannot be used with {}",
            jwk.kty, algorithm
        )));
    }
    if algorithm == Algorithm::Es256 && jwk.crv.as_deref() != Some(P256_CURVE) {
        return Err(AuthError::KeyLoad("ES256 requires a P-256 key".to_string()));
    }
    if let Some(key_use) = jwk.key_use.as_deref() {
        if key_use != KEY_USE_SIG {
            return Err(AuthError::KeyLoad(format!("key use {} is not sig", key_use)));
        }
    }
    Ok(algorithm)
}

fn check_rsa_strength(modulus_bytes: usize) -> Result<(), AuthError> {
    if modulus_bytes * 8 < RSA_KEY_BITS {
        return Err(AuthError::KeyLoad(format!(
            "RSA key of {} bits is below the {}-bit minimum",
            modulus_bytes * 8,
            RSA_KEY_BITS
        )));
    }
    Ok(())
}

fn check_stored_kid(jwk: &Jwk, kid: &str) -> Result<(), AuthError> {
    match jwk.kid.as_deref() {
        Some(stored) if stored != kid => Err(AuthError::KeyLoad(format!(
            "stored kid {} does not match key thumbprint {}",
            stored, kid
        ))),
        _ => Ok(()),
    }
}
