// ABOUTME: Bearer authentication of access tokens with rolling session extension
// ABOUTME: Each successful check pushes the pairing's refresh token expiry forward
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::config::OauthConfig;
use crate::database::Database;
use crate::errors::{Error, Result};
use crate::models::{AccessToken, UserSession};
use chrono::{Duration, Utc};
use tracing::trace;

/// Validates bearer access tokens presented to protected resources.
pub struct Authenticator {
    database: Database,
    config: OauthConfig,
}

impl Authenticator {
    #[must_use]
    pub fn new(database: Database, config: OauthConfig) -> Self {
        Self { database, config }
    }

    /// Authenticate an opaque access token value.
    ///
    /// A valid check also extends the pairing's refresh token to a full
    /// lifetime from now, so a session stays alive as long as its access
    /// tokens keep being used. The extension is monotonic and never
    /// shortens an expiry.
    ///
    /// # Errors
    /// Returns `AccessTokenNotFound` for unknown values and
    /// `AccessTokenExpired` for known but expired ones.
    pub async fn authenticate(&self, token_value: &str) -> Result<AccessToken> {
        let token = self.database.get_access_token_by_value(token_value).await?;

        let now = Utc::now();
        if token.is_expired(now) {
            return Err(Error::AccessTokenExpired);
        }

        let extended = now + Duration::seconds(self.config.refresh_token_lifetime);
        self.database
            .extend_refresh_token(token.client_id, token.user_id, extended)
            .await?;

        trace!(client_id = %token.client_id, "access token authenticated");
        Ok(token)
    }

    /// Delete every access and refresh token belonging to the pairings the
    /// session's token values resolve to. Used on account deletion and
    /// explicit logout-everywhere.
    pub async fn clear_user_tokens(&self, session: &UserSession) -> Result<()> {
        self.database.clear_user_tokens(session).await
    }
}

/// Extract the opaque token from an `Authorization: Bearer ...` header value.
///
/// # Errors
/// Returns `TokenMissing` when the header is absent or not a bearer scheme.
pub fn parse_bearer_token(header: Option<&str>) -> Result<&str> {
    let header = header.ok_or(Error::TokenMissing)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(Error::TokenMissing)?
        .trim();
    if token.is_empty() {
        return Err(Error::TokenMissing);
    }
    Ok(token)
}
