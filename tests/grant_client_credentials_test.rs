// ABOUTME: Integration tests for the client_credentials grant
// ABOUTME: Covers client authentication, scope resolution and the token-only response
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use oauth2_engine::api::BEARER;
use oauth2_engine::Error;

#[tokio::test]
async fn test_client_credentials_grant_issues_access_token_only() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let response = coordinator
        .grant(&harness.request("client_credentials"))
        .await
        .unwrap();

    assert!(!response.access_token.is_empty());
    assert_eq!(response.token_type, BEARER);
    assert_eq!(response.expires_in, 3600);
    // Default scope from the catalog
    assert_eq!(response.scope, "read");
    // Client-only grant: no user and no refresh token
    assert!(response.user_id.is_none());
    assert!(response.refresh_token.is_none());

    // The issued token authenticates
    let token = harness
        .database
        .get_access_token_by_value(&response.access_token)
        .await
        .unwrap();
    assert_eq!(token.client_id, harness.client.id);
    assert!(token.user_id.is_none());
}

#[tokio::test]
async fn test_client_credentials_grant_with_explicit_scope() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let mut request = harness.request("client_credentials");
    request.scope = Some("read_write".to_owned());

    let response = coordinator.grant(&request).await.unwrap();
    assert_eq!(response.scope, "read_write");
}

#[tokio::test]
async fn test_unknown_scope_is_rejected() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let mut request = harness.request("client_credentials");
    request.scope = Some("read delete_everything".to_owned());

    let err = coordinator.grant(&request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidScope));
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn test_wrong_client_secret_is_rejected() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let mut request = harness.request("client_credentials");
    request.client_secret = "bogus".to_owned();

    let err = coordinator.grant(&request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidClientSecret));
    assert_eq!(err.http_status(), 401);
}

#[tokio::test]
async fn test_unknown_client_is_rejected() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let mut request = harness.request("client_credentials");
    request.client_id = "no_such_client".to_owned();

    let err = coordinator.grant(&request).await.unwrap_err();
    assert!(matches!(err, Error::ClientNotFound));
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn test_unknown_grant_type_is_rejected() {
    let harness = common::setup().await;
    let coordinator = harness.coordinator();

    let err = coordinator
        .grant(&harness.request("implicit"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidGrantType));
}
