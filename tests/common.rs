// ABOUTME: Shared test fixture: in-memory database seeded with clients, users and scopes
// ABOUTME: Builders for grant coordinators and token requests used across integration tests
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs, dead_code)]

use chrono::Utc;
use oauth2_engine::api::TokenRequest;
use oauth2_engine::config::{OauthConfig, PasswordPolicy};
use oauth2_engine::database::Database;
use oauth2_engine::grants::GrantCoordinator;
use oauth2_engine::models::{AccessRole, Client, User};
use uuid::Uuid;

pub const TEST_CLIENT_1: &str = "test_client_1";
pub const TEST_CLIENT_2: &str = "test_client_2";
pub const TEST_SECRET: &str = "test_secret";
pub const TEST_USERNAME: &str = "test@example.com";
pub const ARTIST_USERNAME: &str = "artist@example.com";
pub const TEST_PASSWORD: &str = "test_password";
pub const REDIRECT_URI: &str = "https://www.example.com";

/// Low bcrypt cost to keep the test suite fast.
const TEST_BCRYPT_COST: u32 = 4;

pub struct TestHarness {
    pub database: Database,
    pub config: OauthConfig,
    pub client: Client,
    pub other_client: Client,
    pub user: User,
    pub artist: User,
}

impl TestHarness {
    pub fn coordinator(&self) -> GrantCoordinator {
        GrantCoordinator::new(
            self.database.clone(),
            self.config.clone(),
            PasswordPolicy::default(),
        )
    }

    /// A token request carrying the primary test client's credentials.
    pub fn request(&self, grant_type: &str) -> TokenRequest {
        TokenRequest {
            grant_type: grant_type.to_owned(),
            client_id: TEST_CLIENT_1.to_owned(),
            client_secret: TEST_SECRET.to_owned(),
            ..TokenRequest::default()
        }
    }
}

/// Set up an in-memory database seeded with two clients, two users and a
/// small scope catalog ("read" is the default scope).
pub async fn setup() -> TestHarness {
    let database = Database::new("sqlite::memory:").await.unwrap();

    database
        .create_scope("read", Some("Read access"), true)
        .await
        .unwrap();
    database
        .create_scope("read_write", Some("Read and write access"), false)
        .await
        .unwrap();

    let secret_hash = bcrypt::hash(TEST_SECRET, TEST_BCRYPT_COST).unwrap();
    let client = Client::new(
        None,
        TEST_CLIENT_1,
        secret_hash.clone(),
        Some(REDIRECT_URI),
        Some("Test App"),
        Some("www.example.com"),
        Some("https://www.example.com"),
    );
    database.create_client(&client).await.unwrap();

    let other_client = Client::new(
        None,
        TEST_CLIENT_2,
        secret_hash,
        Some(REDIRECT_URI),
        None,
        None,
        None,
    );
    database.create_client(&other_client).await.unwrap();

    let user = seed_user(&database, TEST_USERNAME, AccessRole::User).await;
    let artist = seed_user(&database, ARTIST_USERNAME, AccessRole::Artist).await;

    TestHarness {
        database,
        config: OauthConfig::default(),
        client,
        other_client,
        user,
        artist,
    }
}

/// Insert a user directly, bypassing directory policy, with a fast hash of
/// [`TEST_PASSWORD`].
pub async fn seed_user(database: &Database, username: &str, role: AccessRole) -> User {
    let user = User {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        updated_at: None,
        role,
        username: username.to_owned(),
        password_hash: Some(bcrypt::hash(TEST_PASSWORD, TEST_BCRYPT_COST).unwrap()),
        email_confirmed: true,
    };
    database.create_user(&user).await.unwrap();
    user
}
