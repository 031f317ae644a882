// ABOUTME: Signed email tokens backing password-reset and address-confirmation links
// ABOUTME: HS256 claims carry a reference into the store so links can be revoked
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::config::EmailTokenConfig;
use crate::database::Database;
use crate::errors::{Error, Result};
use crate::models::{EmailToken, User};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Rows are kept this long past expiry before cleanup removes them.
const RETENTION_DAYS: i64 = 30;

#[derive(Debug, Serialize, Deserialize)]
struct EmailTokenClaims {
    username: String,
    reference: Uuid,
    exp: i64,
}

/// Issues and validates the signed tokens embedded in account emails.
pub struct EmailTokenService {
    database: Database,
    config: EmailTokenConfig,
}

impl EmailTokenService {
    #[must_use]
    pub fn new(database: Database, config: EmailTokenConfig) -> Self {
        Self { database, config }
    }

    /// Create an email token for a user: a store row plus the signed claim
    /// string to embed in the emailed link.
    pub async fn create_email_token(&self, user: &User) -> Result<(EmailToken, String)> {
        let token = EmailToken::new(self.config.lifetime);
        self.database.create_email_token(&token).await?;

        let claims = EmailTokenClaims {
            username: user.username.clone(),
            reference: token.reference,
            exp: token.expires_at.timestamp(),
        };
        let signed = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.secret_key.as_bytes()),
        )
        .map_err(|e| Error::Internal(format!("failed to sign email token: {e}")))?;

        Ok((token, signed))
    }

    /// Build the link to embed in the email.
    ///
    /// # Errors
    /// Returns `EmailTokenLinkInvalid` if the base URL does not parse.
    pub fn create_link(&self, base_url: &str, signed: &str) -> Result<String> {
        let mut url = url::Url::parse(base_url).map_err(|_| Error::EmailTokenLinkInvalid)?;
        url.query_pairs_mut().append_pair("token", signed);
        Ok(url.to_string())
    }

    /// Extract the signed claim string from a link a user followed.
    ///
    /// # Errors
    /// Returns `EmailTokenLinkInvalid` if the link does not parse or has no
    /// token parameter.
    pub fn parse_link(&self, link: &str) -> Result<String> {
        let url = url::Url::parse(link).map_err(|_| Error::EmailTokenLinkInvalid)?;
        url.query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .ok_or(Error::EmailTokenLinkInvalid)
    }

    /// Validate a signed claim and fetch its live store row.
    ///
    /// Returns the row and the username the claim was issued for.
    ///
    /// # Errors
    /// Returns `EmailTokenInvalid` for a bad or expired signature and
    /// `EmailTokenNotFound` when the referenced row was already consumed.
    pub async fn get_valid_email_token(&self, signed: &str) -> Result<(EmailToken, String)> {
        let decoded = decode::<EmailTokenClaims>(
            signed,
            &DecodingKey::from_secret(self.config.secret_key.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| Error::EmailTokenInvalid)?;

        let token = self
            .database
            .get_email_token_by_reference(decoded.claims.reference)
            .await?;

        // The store row is the revocation authority; a signed claim for a
        // row past its expiry is no longer acceptable.
        if Utc::now() > token.expires_at {
            return Err(Error::EmailTokenInvalid);
        }

        Ok((token, decoded.claims.username))
    }

    /// Record that the email carrying this token was handed to delivery.
    pub async fn mark_sent(&self, token: &EmailToken) -> Result<()> {
        self.database.mark_email_token_sent(token.id).await
    }

    /// Consume an email token so its link stops working.
    pub async fn consume(&self, token: &EmailToken) -> Result<()> {
        self.database.delete_email_token(token.id).await
    }

    /// Remove rows long past their expiry.
    pub async fn clear_expired(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(RETENTION_DAYS);
        let removed = self.database.clear_expired_email_tokens(cutoff).await?;
        if removed > 0 {
            debug!(removed, "cleared expired email tokens");
        }
        Ok(removed)
    }
}
