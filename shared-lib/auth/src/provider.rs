//! Key provisioning: generation, persistence and loading of key sets.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use error::AuthError;
use tempfile::NamedTempFile;

use crate::algorithm::Algorithm;
use crate::jwk::JwkSet;
use crate::keys::{Keypair, PublicKey};

/// Default file name of the private key set.
pub const PRIVATE_KEY_FILE: &str = "private_jwk.json";
/// Default file name of the public key set.
pub const PUBLIC_KEY_FILE: &str = "public_jwk.json";

#[cfg(unix)]
const PRIVATE_KEY_MODE: u32 = 0o600;
#[cfg(unix)]
const PUBLIC_KEY_MODE: u32 = 0o644;

/// Generate a fresh keypair.
pub fn generate(algorithm: Algorithm) -> Result<Keypair, AuthError> {
    Keypair::generate(algorithm)
}

/// Write the public half of `key` as a JWK set.
pub fn persist_public(key: &Keypair, path: impl AsRef<Path>) -> Result<(), AuthError> {
    let json = JwkSet::single(key.to_public_jwk()).to_json()?;
    write_atomic(path.as_ref(), json.as_bytes(), KeyFileKind::Public)
}

/// Write the private half of `key` as a JWK set, readable by the owner only.
pub fn persist_private(key: &Keypair, path: impl AsRef<Path>) -> Result<(), AuthError> {
    let json = JwkSet::single(key.to_private_jwk()?).to_json()?;
    write_atomic(path.as_ref(), json.as_bytes(), KeyFileKind::Private)
}

/// Load a keypair from a private key set.
pub fn load_keypair(path: impl AsRef<Path>) -> Result<Keypair, AuthError> {
    let set = read_key_set(path.as_ref())?;
    Keypair::from_jwk(set.first()?)
}

/// Load a public key from a public (or private) key set.
pub fn load_public(path: impl AsRef<Path>) -> Result<PublicKey, AuthError> {
    let set = read_key_set(path.as_ref())?;
    PublicKey::from_jwk(set.first()?)
}

fn read_key_set(path: &Path) -> Result<JwkSet, AuthError> {
    let json = fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read key set {}: {}", path.display(), e);
        AuthError::KeyLoad(format!("{}: {}", path.display(), e))
    })?;
    JwkSet::from_json(&json)
}

#[derive(Debug, Clone, Copy)]
enum KeyFileKind {
    Public,
    Private,
}

/// Write `contents` to `path` through a synced temporary file in the same
/// directory, then rename it into place. On failure the target is untouched.
fn write_atomic(path: &Path, contents: &[u8], kind: KeyFileKind) -> Result<(), AuthError> {
    let persistence_error = |e: std::io::Error| {
        tracing::error!("Failed to write key set {}: {}", path.display(), e);
        AuthError::KeyPersistence(format!("{}: {}", path.display(), e))
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(persistence_error)?;

    // NamedTempFile is created 0600 and removed on drop unless persisted.
    let mut file = NamedTempFile::new_in(dir).map_err(persistence_error)?;
    file.write_all(contents).map_err(persistence_error)?;
    file.as_file().sync_all().map_err(persistence_error)?;
    set_mode(&file, kind).map_err(persistence_error)?;
    file.persist(path).map_err(|e| persistence_error(e.error))?;

    tracing::info!(?kind, "Wrote key set {}", path.display());
    Ok(())
}

#[cfg(unix)]
fn set_mode(file: &NamedTempFile, kind: KeyFileKind) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = match kind {
        KeyFileKind::Public => PUBLIC_KEY_MODE,
        KeyFileKind::Private => PRIVATE_KEY_MODE,
    };
    file.as_file()
        .set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &NamedTempFile, _kind: KeyFileKind) -> std::io::Result<()> {
    Ok(())
}

/// Supplies the process's signing key.
///
/// Constructed explicitly and handed to whoever needs the key; there is no
/// global key state.
#[derive(Debug, Clone)]
pub struct KeyProvider {
    dir: Option<PathBuf>,
    algorithm: Algorithm,
    private_file: String,
    public_file: String,
}

impl KeyProvider {
    /// Provider that keeps its key set files in `dir`.
    pub fn new(dir: impl Into<PathBuf>, algorithm: Algorithm) -> Self {
        Self {
            dir: Some(dir.into()),
            algorithm,
            private_file: PRIVATE_KEY_FILE.to_string(),
            public_file: PUBLIC_KEY_FILE.to_string(),
        }
    }

    /// Provider that never touches the disk.
    pub fn ephemeral(algorithm: Algorithm) -> Self {
        Self {
            dir: None,
            algorithm,
            private_file: PRIVATE_KEY_FILE.to_string(),
            public_file: PUBLIC_KEY_FILE.to_string(),
        }
    }

    /// Override the key set file names.
    pub fn with_file_names(mut self, private_file: impl Into<String>, public_file: impl Into<String>) -> Self {
        self.private_file = private_file.into();
        self.public_file = public_file.into();
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn private_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(&self.private_file))
    }

    pub fn public_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(&self.public_file))
    }

    /// Generate a fresh keypair for this provider's algorithm.
    pub fn generate(&self) -> Result<Keypair, AuthError> {
        generate(self.algorithm)
    }

    /// Write both halves of `key` to this provider's files.
    pub fn persist(&self, key: &Keypair) -> Result<(), AuthError> {
        let (Some(private_path), Some(public_path)) = (self.private_path(), self.public_path()) else {
            return Ok(());
        };
        persist_private(key, private_path)?;
        persist_public(key, public_path)
    }

    /// Load the persisted keypair, or generate and persist a new one.
    ///
    /// A stored key for a different algorithm is an error. Failing to persist
    /// a freshly generated key, or to restore a missing public key set, is
    /// logged and the key is still returned.
    pub fn load_or_generate(&self) -> Result<Keypair, AuthError> {
        let (Some(private_path), Some(public_path)) = (self.private_path(), self.public_path()) else {
            tracing::info!(alg = %self.algorithm, "Using ephemeral signing key");
            return self.generate();
        };

        if private_path.exists() {
            let key = load_keypair(&private_path)?;
            if key.algorithm() != self.algorithm {
                return Err(AuthError::KeyLoad(format!(
                    "stored key is {}, configured algorithm is {}",
                    key.algorithm(),
                    self.algorithm
                )));
            }
            if !public_path.exists() {
                if let Err(e) = persist_public(&key, &public_path) {
                    tracing::warn!("Continuing without public key set: {}", e);
                }
            }
            tracing::info!(kid = %key.key_id(), "Loaded signing key from {}", private_path.display());
            return Ok(key);
        }

        let key = self.generate()?;
        if let Err(e) = self.persist(&key) {
            tracing::warn!("Continuing with in-memory signing key: {}", e);
        }
        Ok(key)
    }
}
