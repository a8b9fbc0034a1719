//! End-to-end tests for the token service
//!
//! These tests drive the full pipeline: credential, token issuance,
//! verification, scope decision and the protected API.

use std::sync::Arc;

use auth::{Algorithm, AuthError, API_READ, API_WRITE};
use chrono::{Duration, Utc};
use error::ErrorResponse;
use token_service::{
    bootstrap_keys, AccessService, StaticOracle, TokenServiceConfig, PROTECTED_PAYLOAD,
};

fn demo_oracle() -> StaticOracle {
    StaticOracle::new()
        .with_user("readOnlyUser:password", "readOnlyUserID", &[API_READ])
        .with_user(
            "readWriteUser:password",
            "readWriteUserID",
            &[API_READ, API_WRITE],
        )
        .with_unscoped_fallback("authenticatedUserID")
}

async fn demo_service(algorithm: Algorithm) -> AccessService {
    let config = TokenServiceConfig {
        key_dir: None,
        key_algorithm: algorithm,
        ..TokenServiceConfig::default()
    };
    let keys = bootstrap_keys(&config).await.unwrap();
    AccessService::from_config(&config, Arc::new(demo_oracle()), Arc::new(keys))
}

#[tokio::test]
async fn test_read_only_user_denied_write() {
    let service = demo_service(Algorithm::Es256).await;

    let token = service.issue_token("readOnlyUser:password").unwrap();

    // Reading is allowed
    assert_eq!(
        service.call_protected(token.as_str(), API_READ).unwrap(),
        PROTECTED_PAYLOAD
    );

    // Writing is not
    let denied = service.call_protected(token.as_str(), API_WRITE).unwrap_err();
    assert!(denied.is_denied());
}

#[tokio::test]
async fn test_read_write_user_allowed_write() {
    let service = demo_service(Algorithm::Rs256).await;

    let token = service.issue_token("readWriteUser:password").unwrap();
    let result = service.call_protected(token.as_str(), API_WRITE);
    assert_eq!(result, Ok("api data".to_string()));

    let claims = service.verify(token.as_str()).unwrap();
    assert_eq!(claims.sub, "readWriteUserID");
    assert_eq!(claims.aud, vec!["mobileApp".to_string()]);
}

#[tokio::test]
async fn test_unknown_user_has_no_scopes() {
    let service = demo_service(Algorithm::Es256).await;

    let token = service.issue_token("someone:else").unwrap();
    let claims = service.verify(token.as_str()).unwrap();
    assert_eq!(claims.sub, "authenticatedUserID");
    assert!(claims.scopes.is_empty());

    for scope in [API_READ, API_WRITE, "admin"] {
        let denied = service.call_protected(token.as_str(), scope).unwrap_err();
        assert!(denied.is_denied(), "scope {} should be denied", scope);
    }
}

#[tokio::test]
async fn test_every_failure_looks_the_same() {
    let service = demo_service(Algorithm::Es256).await;
    let now = Utc::now();
    let token = service
        .issue_token_at("readWriteUser:password", now)
        .unwrap()
        .into_string();

    // Flip one character of the signature
    let mut tampered = token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    let responses = vec![
        service.call_protected_at(&tampered, API_WRITE, now),
        service.call_protected_at("not-a-token", API_WRITE, now),
        service.call_protected_at("", API_WRITE, now),
        service.call_protected_at(&token, API_WRITE, now + Duration::hours(2)),
        service.call_protected_at(&token, API_WRITE, now - Duration::minutes(5)),
        service.call_protected_at(&token, "api:admin", now),
    ];

    for response in responses {
        assert_eq!(response, Err(ErrorResponse::denied()));
    }
}

#[tokio::test]
async fn test_internal_reasons_stay_typed() {
    let service = demo_service(Algorithm::Es256).await;
    let now = Utc::now();
    let token = service.issue_token_at("readOnlyUser:password", now).unwrap();

    assert_eq!(
        service.authorize_at(token.as_str(), API_WRITE, now).unwrap_err(),
        AuthError::InsufficientScope(API_WRITE.to_string())
    );
    assert_eq!(
        service
            .authorize_at(token.as_str(), API_READ, now + Duration::hours(1))
            .unwrap_err(),
        AuthError::TokenExpired
    );
}

#[tokio::test]
async fn test_token_from_other_service_rejected() {
    let first = demo_service(Algorithm::Es256).await;
    let second = demo_service(Algorithm::Es256).await;

    let token = first.issue_token("readWriteUser:password").unwrap();
    assert_eq!(
        second.verify(token.as_str()).unwrap_err(),
        AuthError::SignatureMismatch
    );
}

#[tokio::test]
async fn test_persisted_key_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = TokenServiceConfig {
        key_dir: Some(dir.path().to_path_buf()),
        key_algorithm: Algorithm::Es256,
        ..TokenServiceConfig::default()
    };

    let before = AccessService::from_config(
        &config,
        Arc::new(demo_oracle()),
        Arc::new(bootstrap_keys(&config).await.unwrap()),
    );
    let token = before.issue_token("readWriteUser:password").unwrap();

    let after = AccessService::from_config(
        &config,
        Arc::new(demo_oracle()),
        Arc::new(bootstrap_keys(&config).await.unwrap()),
    );
    assert_eq!(
        after.call_protected(token.as_str(), API_WRITE).unwrap(),
        PROTECTED_PAYLOAD
    );
}
