use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth::{API_READ, API_WRITE};
use token_service::{bootstrap_keys, AccessService, StaticOracle, TokenServiceConfig};

const DEFAULT_CREDENTIAL: &str = "readOnlyUser:password";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "token_service=info,auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = TokenServiceConfig::from_env();
    tracing::info!("Starting Token Service v{}", config.version);

    let keys = bootstrap_keys(&config)
        .await
        .context("failed to prepare signing key")?;

    // Development credentials
    let oracle = StaticOracle::new()
        .with_user("readOnlyUser:password", "readOnlyUserID", &[API_READ])
        .with_user(
            "readWriteUser:password",
            "readWriteUserID",
            &[API_READ, API_WRITE],
        )
        .with_unscoped_fallback("authenticatedUserID");

    let service = AccessService::from_config(&config, Arc::new(oracle), Arc::new(keys));

    let credential = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CREDENTIAL.to_string());

    let token = match service.issue_token(&credential) {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!("Token issuance failed: {}", e);
            println!("{}", error::ErrorResponse::from(e).message);
            return Ok(());
        }
    };
    println!("Token: {}", token);

    match service.call_protected(token.as_str(), API_WRITE) {
        Ok(data) => println!("Response: {}", data),
        Err(denied) => println!("Response: {}", denied.message),
    }

    Ok(())
}
