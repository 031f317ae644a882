// ABOUTME: Integration tests for the signed email-token side channel
// ABOUTME: Covers signing, link handling, consumption and retention cleanup
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use oauth2_engine::config::EmailTokenConfig;
use oauth2_engine::email_token::EmailTokenService;
use oauth2_engine::models::EmailToken;
use oauth2_engine::Error;

fn service(harness: &common::TestHarness) -> EmailTokenService {
    EmailTokenService::new(
        harness.database.clone(),
        EmailTokenConfig {
            secret_key: "test_email_secret".to_owned(),
            lifetime: 600,
        },
    )
}

#[tokio::test]
async fn test_email_token_roundtrip() {
    let harness = common::setup().await;
    let service = service(&harness);

    let (token, signed) = service.create_email_token(&harness.user).await.unwrap();
    assert!(!token.email_sent);

    let (found, username) = service.get_valid_email_token(&signed).await.unwrap();
    assert_eq!(found.id, token.id);
    assert_eq!(username, harness.user.username);

    service.mark_sent(&token).await.unwrap();
    let row = harness
        .database
        .get_email_token_by_reference(token.reference)
        .await
        .unwrap();
    assert!(row.email_sent);
    assert!(row.email_sent_at.is_some());
}

#[tokio::test]
async fn test_consumed_token_stops_working() {
    let harness = common::setup().await;
    let service = service(&harness);

    let (token, signed) = service.create_email_token(&harness.user).await.unwrap();
    service.consume(&token).await.unwrap();

    // The signature still verifies, but the row is gone
    let err = service.get_valid_email_token(&signed).await.unwrap_err();
    assert!(matches!(err, Error::EmailTokenNotFound));
}

#[tokio::test]
async fn test_tampered_claim_is_invalid() {
    let harness = common::setup().await;
    let service = service(&harness);

    let (_, signed) = service.create_email_token(&harness.user).await.unwrap();
    let mut tampered = signed.clone();
    tampered.push('x');

    assert!(matches!(
        service.get_valid_email_token(&tampered).await,
        Err(Error::EmailTokenInvalid)
    ));
    assert!(matches!(
        service.get_valid_email_token("garbage").await,
        Err(Error::EmailTokenInvalid)
    ));
}

#[tokio::test]
async fn test_link_building_and_parsing() {
    let harness = common::setup().await;
    let service = service(&harness);

    let (_, signed) = service.create_email_token(&harness.user).await.unwrap();
    let link = service
        .create_link("https://accounts.example.com/password-reset", &signed)
        .unwrap();

    let parsed = service.parse_link(&link).unwrap();
    assert_eq!(parsed, signed);

    assert!(matches!(
        service.parse_link("https://accounts.example.com/password-reset"),
        Err(Error::EmailTokenLinkInvalid)
    ));
    assert!(matches!(
        service.parse_link("not a link"),
        Err(Error::EmailTokenLinkInvalid)
    ));
}

#[tokio::test]
async fn test_retention_cleanup() {
    let harness = common::setup().await;
    let service = service(&harness);

    // Expired long past the retention window
    let stale = EmailToken::new(-40 * 24 * 3600);
    harness.database.create_email_token(&stale).await.unwrap();
    // Recently expired, still within retention
    let recent = EmailToken::new(-60);
    harness.database.create_email_token(&recent).await.unwrap();

    let removed = service.clear_expired().await.unwrap();
    assert_eq!(removed, 1);

    assert!(matches!(
        harness
            .database
            .get_email_token_by_reference(stale.reference)
            .await,
        Err(Error::EmailTokenNotFound)
    ));
    harness
        .database
        .get_email_token_by_reference(recent.reference)
        .await
        .unwrap();
}
