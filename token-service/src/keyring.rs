//! The process-wide signing key.

use std::sync::Arc;

use arc_swap::ArcSwap;
use auth::{AuthError, KeyProvider, Keypair, PublicKey, Signer};
use error::AppError;

use crate::config::TokenServiceConfig;

/// The active signing key, shared by every issue and verify call.
///
/// Readers take a snapshot with [`ActiveKey::current`]; a replacement swaps
/// the whole key atomically, so a reader sees either the old or the new key
/// and never a mix.
#[derive(Debug)]
pub struct ActiveKey {
    current: ArcSwap<Keypair>,
}

impl ActiveKey {
    pub fn new(key: Keypair) -> Self {
        Self {
            current: ArcSwap::from_pointee(key),
        }
    }

    /// Snapshot of the active key.
    pub fn current(&self) -> Arc<Keypair> {
        self.current.load_full()
    }

    /// Public half of the active key.
    pub fn public_key(&self) -> PublicKey {
        self.current.load().public_key().clone()
    }

    /// Signer bound to the active key at the time of the call.
    pub fn signer(&self) -> Signer {
        Signer::new(self.current())
    }

    /// Install `key`, returning the one it replaces.
    pub fn replace(&self, key: Keypair) -> Arc<Keypair> {
        let previous = self.current.swap(Arc::new(key));
        tracing::info!(
            old_kid = %previous.key_id(),
            new_kid = %self.current.load().key_id(),
            "Replaced signing key"
        );
        previous
    }
}

/// Load or generate the signing key described by `config`.
///
/// File access runs on the blocking pool and is bounded by
/// `config.key_io_timeout()`.
pub async fn bootstrap_keys(config: &TokenServiceConfig) -> Result<ActiveKey, AppError> {
    let provider = config.key_provider();
    let timeout = config.key_io_timeout();

    let key = load_with_timeout(provider, timeout).await?;
    tracing::info!(alg = %key.algorithm(), kid = %key.key_id(), "Signing key ready");
    Ok(ActiveKey::new(key))
}

async fn load_with_timeout(
    provider: KeyProvider,
    timeout: std::time::Duration,
) -> Result<Keypair, AppError> {
    let task = tokio::task::spawn_blocking(move || provider.load_or_generate());

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result.map_err(AppError::from),
        Ok(Err(join_error)) => Err(AppError::Internal(format!(
            "key bootstrap task failed: {}",
            join_error
        ))),
        Err(_) => {
            tracing::error!("Key bootstrap timed out after {:?}", timeout);
            Err(AuthError::KeyLoad(format!("timed out after {:?}", timeout)).into())
        }
    }
}
