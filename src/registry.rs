// ABOUTME: Client registry: registration, lookup and secret authentication
// ABOUTME: Client secrets are bcrypt-hashed and keys are matched case-insensitively
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::crypto::password::{hash_password, PasswordVerifiers};
use crate::database::Database;
use crate::errors::{Error, Result};
use crate::models::{Client, User};
use tracing::info;
use url::Url;

/// Parameters for registering a new OAuth client.
#[derive(Debug, Default)]
pub struct ClientRegistration<'a> {
    pub client_id: &'a str,
    pub secret: &'a str,
    pub redirect_uri: Option<&'a str>,
    pub application_name: Option<&'a str>,
    pub application_hostname: Option<&'a str>,
    pub application_url: Option<&'a str>,
}

/// Registry of OAuth applications.
pub struct ClientRegistry {
    database: Database,
    verifiers: PasswordVerifiers,
    /// Hostnames trusted when resolving a client by application URL
    allowed_origins: Vec<String>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new(database: Database, allowed_origins: Vec<String>) -> Self {
        Self {
            database,
            verifiers: PasswordVerifiers::default(),
            allowed_origins,
        }
    }

    /// Register a new client, hashing its secret before storage.
    ///
    /// # Errors
    /// Returns `ClientIdTaken` if the key is already registered.
    pub async fn register_client(
        &self,
        registration: ClientRegistration<'_>,
        owner: Option<&User>,
    ) -> Result<Client> {
        if self.database.client_exists(registration.client_id).await? {
            return Err(Error::ClientIdTaken);
        }

        let secret_hash = hash_password(registration.secret)?;
        let client = Client::new(
            owner,
            registration.client_id,
            secret_hash,
            registration.redirect_uri,
            registration.application_name,
            registration.application_hostname,
            registration.application_url,
        );
        self.database.create_client(&client).await?;

        info!("registered OAuth client: {}", client.key);
        Ok(client)
    }

    /// Fetch a client by its key.
    pub async fn get_client(&self, client_key: &str) -> Result<Client> {
        self.database.get_client_by_key(client_key).await
    }

    /// Authenticate a client by key and plaintext secret.
    ///
    /// # Errors
    /// Returns `ClientNotFound` for an unknown key and `InvalidClientSecret`
    /// when the secret does not match.
    pub async fn authenticate_client(&self, client_key: &str, secret: &str) -> Result<Client> {
        let client = self.database.get_client_by_key(client_key).await?;
        if !self.verifiers.verify(&client.secret_hash, secret) {
            return Err(Error::InvalidClientSecret);
        }
        Ok(client)
    }

    /// Resolve an active client from its application URL.
    ///
    /// The URL's hostname must be one of the configured allowed origins;
    /// anything else resolves to `ClientNotFound` without touching storage.
    pub async fn get_client_by_application_url(&self, application_url: &str) -> Result<Client> {
        let parsed = Url::parse(application_url).map_err(|_| Error::ClientNotFound)?;
        let host = parsed.host_str().ok_or(Error::ClientNotFound)?.to_lowercase();
        if !self.allowed_origins.iter().any(|origin| origin == &host) {
            return Err(Error::ClientNotFound);
        }

        self.database
            .get_client_by_application_url(application_url)
            .await
    }

    /// Delete a client and all tokens issued through it.
    pub async fn delete_client(&self, client: &Client) -> Result<()> {
        self.database.delete_client(client.id).await?;
        info!("deleted OAuth client: {}", client.key);
        Ok(())
    }
}
