// ABOUTME: Integration tests for token introspection
// ABOUTME: Covers hints, error propagation for dead tokens and the rolling side effect
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{Duration, Utc};
use oauth2_engine::api::{IntrospectRequest, BEARER, HINT_REFRESH_TOKEN};
use oauth2_engine::introspect::Introspector;
use oauth2_engine::models::{AccessToken, RefreshToken};
use oauth2_engine::Error;

fn introspector(harness: &common::TestHarness) -> Introspector {
    Introspector::new(harness.database.clone(), harness.config.clone())
}

fn request(token: &str, hint: Option<&str>) -> IntrospectRequest {
    IntrospectRequest {
        token: Some(token.to_owned()),
        token_type_hint: hint.map(str::to_owned),
    }
}

#[tokio::test]
async fn test_introspect_access_token_default_hint() {
    let harness = common::setup().await;
    let introspector = introspector(&harness);

    let access = AccessToken::new(&harness.client, Some(&harness.user), 3600, "read").unwrap();
    harness.database.store_access_token(&access).await.unwrap();

    let response = introspector
        .introspect(&harness.client, &request(&access.token, None))
        .await
        .unwrap();

    assert!(response.active);
    assert_eq!(response.scope.as_deref(), Some("read"));
    assert_eq!(response.token_type.as_deref(), Some(BEARER));
    assert_eq!(response.expires_at, Some(access.expires_at.timestamp()));
    assert_eq!(response.client_id.as_deref(), Some(common::TEST_CLIENT_1));
    assert_eq!(response.username.as_deref(), Some(common::TEST_USERNAME));
}

#[tokio::test]
async fn test_introspect_userless_access_token() {
    let harness = common::setup().await;
    let introspector = introspector(&harness);

    let access = AccessToken::new(&harness.client, None, 3600, "read").unwrap();
    harness.database.store_access_token(&access).await.unwrap();

    let response = introspector
        .introspect(&harness.client, &request(&access.token, None))
        .await
        .unwrap();
    assert!(response.active);
    assert!(response.username.is_none());
}

#[tokio::test]
async fn test_introspection_rolls_the_paired_refresh_token_forward() {
    let harness = common::setup().await;
    let introspector = introspector(&harness);

    // Refresh token about to expire, access token still live
    let refresh = RefreshToken::new(&harness.client, Some(&harness.user), 10, "read").unwrap();
    let refresh = harness
        .database
        .get_or_create_refresh_token(refresh, Utc::now())
        .await
        .unwrap();
    let access = AccessToken::new(&harness.client, Some(&harness.user), 3600, "read").unwrap();
    harness.database.store_access_token(&access).await.unwrap();

    let before = Utc::now();
    introspector
        .introspect(&harness.client, &request(&access.token, None))
        .await
        .unwrap();

    // Same rolling-session side effect as bearer authentication
    let extended = harness
        .database
        .get_refresh_token_by_value(harness.client.id, &refresh.token)
        .await
        .unwrap();
    let expected = before + Duration::seconds(harness.config.refresh_token_lifetime);
    assert!(extended.expires_at >= expected - Duration::seconds(5));
    assert!(extended.expires_at <= expected + Duration::seconds(5));
}

#[tokio::test]
async fn test_introspect_refresh_token_hint() {
    let harness = common::setup().await;
    let introspector = introspector(&harness);

    let refresh =
        RefreshToken::new(&harness.client, Some(&harness.user), 3600, "read_write").unwrap();
    let refresh = harness
        .database
        .get_or_create_refresh_token(refresh, Utc::now())
        .await
        .unwrap();

    let response = introspector
        .introspect(
            &harness.client,
            &request(&refresh.token, Some(HINT_REFRESH_TOKEN)),
        )
        .await
        .unwrap();

    assert!(response.active);
    assert_eq!(response.scope.as_deref(), Some("read_write"));
    assert_eq!(response.username.as_deref(), Some(common::TEST_USERNAME));

    // Invisible to a different client
    let err = introspector
        .introspect(
            &harness.other_client,
            &request(&refresh.token, Some(HINT_REFRESH_TOKEN)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RefreshTokenNotFound));
}

#[tokio::test]
async fn test_dead_tokens_propagate_errors() {
    let harness = common::setup().await;
    let introspector = introspector(&harness);

    // Unknown access token value
    let err = introspector
        .introspect(&harness.client, &request("no-such-token", None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccessTokenNotFound));
    assert_eq!(err.http_status(), 404);

    // Expired access token
    let expired = AccessToken::new(&harness.client, Some(&harness.user), -60, "read").unwrap();
    harness.database.store_access_token(&expired).await.unwrap();
    let err = introspector
        .introspect(&harness.client, &request(&expired.token, None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccessTokenExpired));

    // Expired refresh token
    let stale = RefreshToken::new(&harness.client, None, -60, "read").unwrap();
    let stale = harness
        .database
        .get_or_create_refresh_token(stale, Utc::now())
        .await
        .unwrap();
    let err = introspector
        .introspect(
            &harness.client,
            &request(&stale.token, Some(HINT_REFRESH_TOKEN)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RefreshTokenExpired));
}

#[tokio::test]
async fn test_malformed_introspection_requests() {
    let harness = common::setup().await;
    let introspector = introspector(&harness);

    let err = introspector
        .introspect(&harness.client, &IntrospectRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenMissing));
    assert_eq!(err.http_status(), 400);

    let err = introspector
        .introspect(&harness.client, &request("abc", Some("id_token")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenHintInvalid));
}
