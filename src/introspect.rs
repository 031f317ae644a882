// ABOUTME: Token introspection: reports liveness and metadata for presented tokens
// ABOUTME: Access-token hints dispatch through bearer authentication, side effects included
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::api::{
    IntrospectRequest, IntrospectResponse, BEARER, HINT_ACCESS_TOKEN, HINT_REFRESH_TOKEN,
};
use crate::authenticator::Authenticator;
use crate::config::OauthConfig;
use crate::database::Database;
use crate::errors::{Error, Result};
use crate::models::Client;
use chrono::Utc;
use uuid::Uuid;

/// Answers introspection requests from authenticated clients.
pub struct Introspector {
    database: Database,
    authenticator: Authenticator,
}

impl Introspector {
    #[must_use]
    pub fn new(database: Database, config: OauthConfig) -> Self {
        Self {
            authenticator: Authenticator::new(database.clone(), config),
            database,
        }
    }

    /// Introspect a token on behalf of an authenticated client.
    ///
    /// The hint defaults to `access_token` and dispatches through the same
    /// bearer authentication protected resources use, so a valid access
    /// token's introspection also rolls the pairing's refresh token forward.
    ///
    /// # Errors
    /// Propagates not-found and expired errors for the presented token;
    /// a missing token or an unknown hint is reported as malformed input.
    pub async fn introspect(
        &self,
        client: &Client,
        request: &IntrospectRequest,
    ) -> Result<IntrospectResponse> {
        let token = request
            .token
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or(Error::TokenMissing)?;

        let hint = request
            .token_type_hint
            .as_deref()
            .unwrap_or(HINT_ACCESS_TOKEN);

        match hint {
            HINT_ACCESS_TOKEN => self.introspect_access_token(token).await,
            HINT_REFRESH_TOKEN => self.introspect_refresh_token(client, token).await,
            _ => Err(Error::TokenHintInvalid),
        }
    }

    async fn introspect_access_token(&self, token: &str) -> Result<IntrospectResponse> {
        let found = self.authenticator.authenticate(token).await?;

        Ok(IntrospectResponse {
            active: true,
            scope: Some(found.scope),
            token_type: Some(BEARER.to_owned()),
            expires_at: Some(found.expires_at.timestamp()),
            client_id: Some(self.client_key(found.client_id).await?),
            username: self.username(found.user_id).await?,
        })
    }

    async fn introspect_refresh_token(
        &self,
        client: &Client,
        token: &str,
    ) -> Result<IntrospectResponse> {
        // Refresh tokens are only visible to the client they were issued
        // through.
        let found = self
            .database
            .get_refresh_token_by_value(client.id, token)
            .await?;
        if found.is_expired(Utc::now()) {
            return Err(Error::RefreshTokenExpired);
        }

        Ok(IntrospectResponse {
            active: true,
            scope: Some(found.scope),
            token_type: Some(BEARER.to_owned()),
            expires_at: Some(found.expires_at.timestamp()),
            client_id: Some(client.key.clone()),
            username: self.username(found.user_id).await?,
        })
    }

    async fn client_key(&self, client_id: Uuid) -> Result<String> {
        Ok(self.database.get_client_by_id(client_id).await?.key)
    }

    async fn username(&self, user_id: Option<Uuid>) -> Result<Option<String>> {
        match user_id {
            Some(user_id) => Ok(Some(
                self.database.get_user_by_id(user_id).await?.username,
            )),
            None => Ok(None),
        }
    }
}
