// ABOUTME: Integration tests for the refresh_token grant
// ABOUTME: Covers non-rotation, scope narrowing rules and expiry handling
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::Utc;
use oauth2_engine::api::TokenRequest;
use oauth2_engine::models::RefreshToken;
use oauth2_engine::Error;

/// Run a password grant and return the issued (access, refresh) pair.
async fn issue_pair(harness: &common::TestHarness, scope: &str) -> (String, String) {
    let mut request = harness.request("password");
    request.username = Some(common::TEST_USERNAME.to_owned());
    request.password = Some(common::TEST_PASSWORD.to_owned());
    request.scope = Some(scope.to_owned());

    let response = harness.coordinator().grant(&request).await.unwrap();
    (response.access_token, response.refresh_token.unwrap())
}

fn refresh_request(harness: &common::TestHarness, token: &str) -> TokenRequest {
    let mut request = harness.request("refresh_token");
    request.refresh_token = Some(token.to_owned());
    request
}

#[tokio::test]
async fn test_refresh_grant_returns_same_refresh_token() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let (access, refresh) = issue_pair(&harness, "read_write").await;
    let response = coordinator
        .grant(&refresh_request(&harness, &refresh))
        .await
        .unwrap();

    // A fresh access token, but the refresh token is not rotated
    assert_ne!(response.access_token, access);
    assert_eq!(response.refresh_token.as_deref(), Some(refresh.as_str()));
    assert_eq!(response.scope, "read_write");
    assert_eq!(response.user_id, Some(harness.user.id));
}

#[tokio::test]
async fn test_refresh_scope_defaults_to_original() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let (_, refresh) = issue_pair(&harness, "read_write").await;
    let response = coordinator
        .grant(&refresh_request(&harness, &refresh))
        .await
        .unwrap();
    assert_eq!(response.scope, "read_write");
}

#[tokio::test]
async fn test_refresh_scope_cannot_escalate() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let (_, refresh) = issue_pair(&harness, "read_write").await;

    let mut request = refresh_request(&harness, &refresh);
    request.scope = Some("read read_write".to_owned());

    let err = coordinator.grant(&request).await.unwrap_err();
    assert!(matches!(err, Error::RequestedScopeCannotBeGreater));
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn test_refresh_scope_can_narrow() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let (_, refresh) = issue_pair(&harness, "read read_write").await;

    let mut request = refresh_request(&harness, &refresh);
    request.scope = Some("read".to_owned());

    let response = coordinator.grant(&request).await.unwrap();
    assert_eq!(response.scope, "read");
}

#[tokio::test]
async fn test_unknown_refresh_token_value() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let err = coordinator
        .grant(&refresh_request(&harness, "no-such-token"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RefreshTokenNotFound));
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn test_refresh_token_is_bound_to_its_client() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let (_, refresh) = issue_pair(&harness, "read").await;

    let mut request = refresh_request(&harness, &refresh);
    request.client_id = common::TEST_CLIENT_2.to_owned();

    let err = coordinator.grant(&request).await.unwrap_err();
    assert!(matches!(err, Error::RefreshTokenNotFound));
}

#[tokio::test]
async fn test_expired_refresh_token() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    // Seed an already-expired refresh token for a user-less pairing
    let expired = RefreshToken::new(&harness.other_client, None, -60, "read").unwrap();
    let stored = harness
        .database
        .get_or_create_refresh_token(expired, Utc::now())
        .await
        .unwrap();

    let mut request = refresh_request(&harness, &stored.token);
    request.client_id = common::TEST_CLIENT_2.to_owned();

    let err = coordinator.grant(&request).await.unwrap_err();
    assert!(matches!(err, Error::RefreshTokenExpired));
    assert_eq!(err.http_status(), 400);
}
