// ABOUTME: Persistent entities of the OAuth2 engine and their constructors
// ABOUTME: Clients, users, roles, the three OAuth token kinds, and email tokens
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::crypto;
use crate::errors::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Access role a resource-owner user holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRole {
    Superuser,
    User,
    Artist,
    Label,
}

impl AccessRole {
    /// Stable string identifier persisted in the users table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Superuser => "superuser",
            Self::User => "user",
            Self::Artist => "artist",
            Self::Label => "label",
        }
    }

    /// Parse a persisted role identifier.
    ///
    /// # Errors
    /// Returns `RoleNotFound` for unknown identifiers.
    pub fn from_str(id: &str) -> Result<Self> {
        match id {
            "superuser" => Ok(Self::Superuser),
            "user" => Ok(Self::User),
            "artist" => Ok(Self::Artist),
            "label" => Ok(Self::Label),
            _ => Err(Error::RoleNotFound),
        }
    }
}

/// A registered OAuth application.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Opaque client identifier, stored lowercased and unique
    pub key: String,
    /// bcrypt hash of the client secret; the plaintext is never persisted
    pub secret_hash: String,
    /// Owning user, when the client was registered by a resource owner
    pub user_id: Option<Uuid>,
    pub redirect_uri: Option<String>,
    pub application_name: Option<String>,
    pub application_hostname: Option<String>,
    pub application_url: Option<String>,
    pub active: bool,
}

impl Client {
    /// Build a new client with a lowercased key and hashed secret.
    pub fn new(
        owner: Option<&User>,
        client_id: &str,
        secret_hash: String,
        redirect_uri: Option<&str>,
        application_name: Option<&str>,
        application_hostname: Option<&str>,
        application_url: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            key: client_id.to_lowercase(),
            secret_hash,
            user_id: owner.map(|user| user.id),
            redirect_uri: redirect_uri.map(str::to_owned),
            application_name: application_name.map(str::to_owned),
            application_hostname: application_hostname.map(str::to_lowercase),
            application_url: application_url.map(str::to_lowercase),
            active: true,
        }
    }
}

/// A resource-owner user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub role: AccessRole,
    /// Email address, stored lowercased and unique case-insensitively
    pub username: String,
    /// bcrypt hash; `None` means the account has no usable password
    pub password_hash: Option<String>,
    pub email_confirmed: bool,
}

/// A bearer access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub client_id: Uuid,
    /// `None` for client-only (client_credentials) grants
    pub user_id: Option<Uuid>,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}

impl AccessToken {
    /// Build a new access token with a freshly generated opaque value.
    ///
    /// # Errors
    /// Returns an error if token generation fails.
    pub fn new(
        client: &Client,
        user: Option<&User>,
        expires_in: i64,
        scope: &str,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            client_id: client.id,
            user_id: user.map(|u| u.id),
            token: crypto::generate_opaque_token()?,
            expires_at: Utc::now() + Duration::seconds(expires_in),
            scope: scope.to_owned(),
        })
    }

    /// Strict expiry check: a token is expired once `now` is past `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A long-lived refresh token, at most one active per (client, user) pairing.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub client_id: Uuid,
    pub user_id: Option<Uuid>,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The maximal scope ever granted to the pairing
    pub scope: String,
}

impl RefreshToken {
    /// Build a new refresh token with a freshly generated opaque value.
    ///
    /// # Errors
    /// Returns an error if token generation fails.
    pub fn new(
        client: &Client,
        user: Option<&User>,
        expires_in: i64,
        scope: &str,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            client_id: client.id,
            user_id: user.map(|u| u.id),
            token: crypto::generate_opaque_token()?,
            expires_at: Utc::now() + Duration::seconds(expires_in),
            scope: scope.to_owned(),
        })
    }

    /// Strict expiry check: a token is expired once `now` is past `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A single-use authorization code bound to its issuance redirect URI.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub client_id: Uuid,
    pub user_id: Option<Uuid>,
    pub code: String,
    pub redirect_uri: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}

impl AuthorizationCode {
    /// Build a new authorization code with a freshly generated opaque value.
    ///
    /// # Errors
    /// Returns an error if code generation fails.
    pub fn new(
        client: &Client,
        user: &User,
        expires_in: i64,
        redirect_uri: &str,
        scope: &str,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            client_id: client.id,
            user_id: Some(user.id),
            code: crypto::generate_opaque_token()?,
            redirect_uri: Some(redirect_uri.to_owned()),
            expires_at: Utc::now() + Duration::seconds(expires_in),
            scope: scope.to_owned(),
        })
    }

    /// Strict expiry check: a code is expired once `now` is past `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Side-channel token row backing password reset and email confirmation.
///
/// The signed claim handed to the user embeds `reference`; only the reference
/// and delivery bookkeeping live in the store.
#[derive(Debug, Clone)]
pub struct EmailToken {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub reference: Uuid,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl EmailToken {
    /// Build a new email-token row expiring `expires_in` seconds from now.
    #[must_use]
    pub fn new(expires_in: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            reference: Uuid::new_v4(),
            email_sent: false,
            email_sent_at: None,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }
}

/// The (client, user, token) triple a web session holds; used by
/// logout-everywhere and account deletion to clear the pairing's tokens.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub client_key: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_role_roundtrip() {
        for role in [
            AccessRole::Superuser,
            AccessRole::User,
            AccessRole::Artist,
            AccessRole::Label,
        ] {
            assert_eq!(AccessRole::from_str(role.as_str()).unwrap(), role);
        }
        assert!(matches!(
            AccessRole::from_str("wizard"),
            Err(Error::RoleNotFound)
        ));
    }

    #[test]
    fn test_expiry_is_strict() {
        let client = Client::new(None, "Test_Client", "hash".to_owned(), None, None, None, None);
        let token = AccessToken::new(&client, None, 0, "read").unwrap();
        // now == expires_at is not expired; only now > expires_at is
        assert!(!token.is_expired(token.expires_at));
        assert!(token.is_expired(token.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn test_client_key_is_lowercased() {
        let client = Client::new(
            None,
            "Test_Client",
            "hash".to_owned(),
            Some("https://www.example.com"),
            Some("Test App"),
            Some("WWW.Example.Com"),
            Some("HTTPS://www.example.com"),
        );
        assert_eq!(client.key, "test_client");
        assert_eq!(client.application_hostname.as_deref(), Some("www.example.com"));
        assert_eq!(client.application_url.as_deref(), Some("https://www.example.com"));
    }
}
