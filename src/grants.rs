// ABOUTME: Grant coordinator: dispatches token requests across the four grant types
// ABOUTME: Client authentication, scope resolution and token issuance with retry on collision
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::api::{TokenRequest, TokenResponse, BEARER};
use crate::config::{OauthConfig, PasswordPolicy};
use crate::database::Database;
use crate::directory::UserDirectory;
use crate::errors::{Error, Result};
use crate::models::{AccessRole, AccessToken, AuthorizationCode, Client, RefreshToken, User};
use crate::registry::ClientRegistry;
use crate::scope;
use chrono::Utc;
use tracing::{debug, info};

/// Attempts at issuing a token pair before a value collision is fatal.
/// Collisions on 256-bit random values indicate something is badly wrong
/// with the RNG, so one retry is generosity enough.
const TOKEN_ISSUE_ATTEMPTS: u32 = 2;

/// Grant coordinator: the engine behind the token endpoint.
pub struct GrantCoordinator {
    database: Database,
    registry: ClientRegistry,
    directory: UserDirectory,
    config: OauthConfig,
    /// Roles permitted to obtain tokens through the password grant
    allowed_roles: Vec<AccessRole>,
}

impl GrantCoordinator {
    #[must_use]
    pub fn new(database: Database, config: OauthConfig, policy: PasswordPolicy) -> Self {
        Self {
            registry: ClientRegistry::new(database.clone(), config.allowed_origins.clone()),
            directory: UserDirectory::new(database.clone(), policy),
            database,
            config,
            allowed_roles: vec![AccessRole::Superuser, AccessRole::User],
        }
    }

    /// Restrict the password grant to the given roles.
    #[must_use]
    pub fn restrict_to_roles(mut self, roles: Vec<AccessRole>) -> Self {
        self.allowed_roles = roles;
        self
    }

    /// Shared client registry.
    #[must_use]
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Shared user directory.
    #[must_use]
    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    /// Handle a token request: authenticate the client, then dispatch on
    /// the grant type.
    pub async fn grant(&self, request: &TokenRequest) -> Result<TokenResponse> {
        let client = self
            .registry
            .authenticate_client(&request.client_id, &request.client_secret)
            .await?;

        debug!(
            client = %client.key,
            grant_type = %request.grant_type,
            "token request"
        );

        match request.grant_type.as_str() {
            "authorization_code" => self.authorization_code_grant(&client, request).await,
            "client_credentials" => self.client_credentials_grant(&client, request).await,
            "password" => self.password_grant(&client, request).await,
            "refresh_token" => self.refresh_token_grant(&client, request).await,
            _ => Err(Error::InvalidGrantType),
        }
    }

    /// Issue a token pair for an already-authenticated user, as the web
    /// login flow does after a session is established.
    pub async fn login(&self, client: &Client, user: &User) -> Result<TokenResponse> {
        if !self.allowed_roles.contains(&user.role) {
            return Err(Error::InvalidUsernameOrPassword);
        }

        let scope = self.database.get_default_scope().await?;
        let response = self.issue_pair(client, Some(user), &scope).await?;

        info!(client = %client.key, user = %user.username, "login token pair issued");
        Ok(response)
    }

    /// Issue a single-use authorization code for an authorize-endpoint
    /// approval. The code inherits the presented redirect URI and must be
    /// redeemed with the same value.
    pub async fn grant_authorization_code(
        &self,
        client: &Client,
        user: &User,
        redirect_uri: &str,
        requested_scope: Option<&str>,
    ) -> Result<AuthorizationCode> {
        let scope = scope::resolve_scope(&self.database, requested_scope).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let code = AuthorizationCode::new(
                client,
                user,
                self.config.auth_code_lifetime,
                redirect_uri,
                &scope,
            )?;
            match self.database.store_authorization_code(&code).await {
                Ok(()) => return Ok(code),
                Err(err) if err.is_retryable() && attempt < TOKEN_ISSUE_ATTEMPTS => {
                    debug!("code value collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn client_credentials_grant(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse> {
        let scope = scope::resolve_scope(&self.database, request.scope.as_deref()).await?;

        // Client-only grants get no refresh token; the client can simply
        // authenticate again.
        let mut attempt = 0;
        let access = loop {
            attempt += 1;
            let access =
                AccessToken::new(client, None, self.config.access_token_lifetime, &scope)?;
            match self.database.store_access_token(&access).await {
                Ok(()) => break access,
                Err(err) if err.is_retryable() && attempt < TOKEN_ISSUE_ATTEMPTS => {
                    debug!("token value collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        };

        Ok(self.token_response(&access, None))
    }

    async fn password_grant(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse> {
        let username = request.username.as_deref().unwrap_or_default();
        let password = request.password.as_deref().unwrap_or_default();

        // Every user-side failure collapses into one answer so the endpoint
        // cannot be used to probe which usernames exist.
        let user = self
            .directory
            .authenticate_user(username, password)
            .await
            .map_err(|_| Error::InvalidUsernameOrPassword)?;
        if !self.allowed_roles.contains(&user.role) {
            return Err(Error::InvalidUsernameOrPassword);
        }

        let scope = scope::resolve_scope(&self.database, request.scope.as_deref()).await?;
        self.issue_pair(client, Some(&user), &scope).await
    }

    async fn authorization_code_grant(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse> {
        let code_value = request.code.as_deref().unwrap_or_default();
        let code = self
            .database
            .get_authorization_code(client.id, code_value)
            .await?;

        // The redirect URI must match before expiry is even considered, so
        // a mismatched caller learns nothing about the code's state.
        let presented = request.redirect_uri.as_deref().unwrap_or_default();
        if presented != code.redirect_uri.as_deref().unwrap_or_default() {
            return Err(Error::InvalidRedirectUri);
        }
        if code.is_expired(Utc::now()) {
            return Err(Error::AuthorizationCodeExpired);
        }

        let user = match code.user_id {
            Some(user_id) => Some(self.database.get_user_by_id(user_id).await?),
            None => None,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let now = Utc::now();
            let access = AccessToken::new(
                client,
                user.as_ref(),
                self.config.access_token_lifetime,
                &code.scope,
            )?;
            let candidate = RefreshToken::new(
                client,
                user.as_ref(),
                self.config.refresh_token_lifetime,
                &code.scope,
            )?;

            match self
                .database
                .redeem_authorization_code(code.id, &access, candidate, now)
                .await
            {
                Ok(refresh) => {
                    return Ok(self.token_response(&access, Some(&refresh.token)));
                }
                Err(err) if err.is_retryable() && attempt < TOKEN_ISSUE_ATTEMPTS => {
                    debug!("token value collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn refresh_token_grant(
        &self,
        client: &Client,
        request: &TokenRequest,
    ) -> Result<TokenResponse> {
        let token_value = request.refresh_token.as_deref().unwrap_or_default();
        let refresh = self
            .database
            .get_refresh_token_by_value(client.id, token_value)
            .await?;

        let now = Utc::now();
        if refresh.is_expired(now) {
            return Err(Error::RefreshTokenExpired);
        }

        // The requested scope defaults to what the refresh token already
        // carries and may only narrow it, never widen it.
        let requested = match request.scope.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                scope::resolve_scope(&self.database, Some(raw)).await?
            }
            _ => refresh.scope.clone(),
        };
        if !scope::is_subset(&requested, &refresh.scope) {
            return Err(Error::RequestedScopeCannotBeGreater);
        }

        let user = match refresh.user_id {
            Some(user_id) => Some(self.database.get_user_by_id(user_id).await?),
            None => None,
        };

        let mut attempt = 0;
        let access = loop {
            attempt += 1;
            let access = AccessToken::new(
                client,
                user.as_ref(),
                self.config.access_token_lifetime,
                &requested,
            )?;
            match self.database.store_access_token(&access).await {
                Ok(()) => break access,
                Err(err) if err.is_retryable() && attempt < TOKEN_ISSUE_ATTEMPTS => {
                    debug!("token value collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        };

        // The refresh token itself is not rotated; the caller keeps using
        // the same value until it expires.
        Ok(self.token_response(&access, Some(&refresh.token)))
    }

    /// Issue an access token and the pairing's refresh token together.
    async fn issue_pair(
        &self,
        client: &Client,
        user: Option<&User>,
        scope: &str,
    ) -> Result<TokenResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let now = Utc::now();
            let access =
                AccessToken::new(client, user, self.config.access_token_lifetime, scope)?;
            let candidate =
                RefreshToken::new(client, user, self.config.refresh_token_lifetime, scope)?;

            match self.database.issue_token_pair(&access, candidate, now).await {
                Ok(refresh) => {
                    return Ok(self.token_response(&access, Some(&refresh.token)));
                }
                Err(err) if err.is_retryable() && attempt < TOKEN_ISSUE_ATTEMPTS => {
                    debug!("token value collision, regenerating");
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn token_response(&self, access: &AccessToken, refresh_token: Option<&str>) -> TokenResponse {
        TokenResponse {
            user_id: access.user_id,
            access_token: access.token.clone(),
            expires_in: self.config.access_token_lifetime,
            token_type: BEARER.to_owned(),
            scope: access.scope.clone(),
            refresh_token: refresh_token.map(str::to_owned),
        }
    }
}
