use std::path::PathBuf;
use std::time::Duration;

use auth::{Algorithm, ClaimsConfig, KeyProvider, Validation};
use serde::{Deserialize, Serialize};

/// Token service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenServiceConfig {
    /// Issuer stamped into and required from every token
    pub issuer: String,

    /// Intended consumers of issued tokens; the first one is required on verification
    pub audience: Vec<String>,

    /// Token validity in seconds
    pub token_ttl_secs: i64,

    /// How far `nbf` is backdated from issue time, in seconds
    pub clock_skew_secs: i64,

    /// Leeway applied to `nbf` and `exp` on verification, in seconds
    pub leeway_secs: i64,

    /// Directory holding the key set files. `None` keeps the key in memory only.
    pub key_dir: Option<PathBuf>,

    /// Signing algorithm of the generated key
    pub key_algorithm: Algorithm,

    /// Upper bound on loading or writing the key set at startup, in seconds
    pub key_io_timeout_secs: u64,

    /// Service version
    pub version: String,
}

impl Default for TokenServiceConfig {
    fn default() -> Self {
        Self {
            issuer: auth::DEFAULT_ISSUER.to_string(),
            audience: vec![auth::DEFAULT_AUDIENCE.to_string()],
            token_ttl_secs: auth::DEFAULT_TTL_SECS,
            clock_skew_secs: auth::DEFAULT_CLOCK_SKEW_SECS,
            leeway_secs: auth::DEFAULT_LEEWAY_SECS,
            key_dir: Some(PathBuf::from(".")),
            key_algorithm: Algorithm::Rs256,
            key_io_timeout_secs: 10,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl TokenServiceConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// Unparseable values keep their default and are reported.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(issuer) = lookup("TOKEN_ISSUER") {
            config.issuer = issuer;
        }

        if let Some(audience) = lookup("TOKEN_AUDIENCE") {
            let audience: Vec<String> = audience
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect();
            if audience.is_empty() {
                tracing::warn!("TOKEN_AUDIENCE is empty, keeping default");
            } else {
                config.audience = audience;
            }
        }

        parse_into(&lookup, "TOKEN_TTL_SECS", &mut config.token_ttl_secs);
        parse_into(&lookup, "TOKEN_CLOCK_SKEW_SECS", &mut config.clock_skew_secs);
        parse_into(&lookup, "TOKEN_LEEWAY_SECS", &mut config.leeway_secs);
        parse_into(&lookup, "KEY_IO_TIMEOUT_SECS", &mut config.key_io_timeout_secs);
        parse_into(&lookup, "KEY_ALGORITHM", &mut config.key_algorithm);

        if let Some(dir) = lookup("KEY_DIR") {
            config.key_dir = if dir.is_empty() || dir == "memory" {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }

        config
    }

    /// Claim settings for issuing tokens
    pub fn claims_config(&self) -> ClaimsConfig {
        ClaimsConfig::new(self.issuer.clone(), self.audience.clone())
            .with_ttl(seconds_or_default(
                "TOKEN_TTL_SECS",
                self.token_ttl_secs,
                auth::DEFAULT_TTL_SECS,
            ))
            .with_clock_skew(seconds_or_default(
                "TOKEN_CLOCK_SKEW_SECS",
                self.clock_skew_secs,
                auth::DEFAULT_CLOCK_SKEW_SECS,
            ))
    }

    /// Verification policy matching what this service issues
    pub fn validation(&self) -> Validation {
        let leeway = seconds_or_default(
            "TOKEN_LEEWAY_SECS",
            self.leeway_secs.max(0),
            auth::DEFAULT_LEEWAY_SECS,
        );
        let validation = Validation::new()
            .with_leeway(leeway)
            .with_issuer(self.issuer.clone());
        match self.audience.first() {
            Some(audience) => validation.with_audience(audience.clone()),
            None => validation,
        }
    }

    /// Key provider for the configured directory and algorithm
    pub fn key_provider(&self) -> KeyProvider {
        match &self.key_dir {
            Some(dir) => KeyProvider::new(dir.clone(), self.key_algorithm),
            None => KeyProvider::ephemeral(self.key_algorithm),
        }
    }

    /// Get key I/O timeout as Duration
    pub fn key_io_timeout(&self) -> Duration {
        Duration::from_secs(self.key_io_timeout_secs)
    }
}

/// `secs` as a duration, or `default` when chrono cannot represent it.
fn seconds_or_default(key: &str, secs: i64, default: i64) -> chrono::Duration {
    chrono::Duration::try_seconds(secs).unwrap_or_else(|| {
        tracing::warn!("{}={} is out of range, using {}", key, secs, default);
        chrono::Duration::seconds(default)
    })
}

fn parse_into<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!("Ignoring invalid {}={:?}", key, raw),
        }
    }
}
