// ABOUTME: Client store: schema and queries for registered OAuth applications
// ABOUTME: Lookup by key, id and application URL plus cascading deletion
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::Database;
use crate::errors::{Error, Result};
use crate::models::Client;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create the clients table.
    pub(super) async fn migrate_clients(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_clients (
                id TEXT PRIMARY KEY,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                key TEXT UNIQUE NOT NULL,
                secret_hash TEXT NOT NULL,
                user_id TEXT,
                redirect_uri TEXT,
                application_name TEXT,
                application_hostname TEXT,
                application_url TEXT,
                active INTEGER NOT NULL DEFAULT 1
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"CREATE INDEX IF NOT EXISTS idx_oauth_clients_application_url
              ON oauth_clients(application_url)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Whether a client with this key already exists (case-insensitive).
    pub async fn client_exists(&self, client_key: &str) -> Result<bool> {
        let row = sqlx::query(r"SELECT COUNT(*) as count FROM oauth_clients WHERE key = ?")
            .bind(client_key.to_lowercase())
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    /// Insert a new client row.
    pub async fn create_client(&self, client: &Client) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO oauth_clients (
                id, created_at, key, secret_hash, user_id, redirect_uri,
                application_name, application_hostname, application_url, active
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(client.id.to_string())
        .bind(client.created_at)
        .bind(&client.key)
        .bind(&client.secret_hash)
        .bind(client.user_id.map(|id| id.to_string()))
        .bind(&client.redirect_uri)
        .bind(&client.application_name)
        .bind(&client.application_hostname)
        .bind(&client.application_url)
        .bind(client.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch a client by its key (case-insensitive).
    pub async fn get_client_by_key(&self, client_key: &str) -> Result<Client> {
        let row = sqlx::query(r"SELECT * FROM oauth_clients WHERE key = ?")
            .bind(client_key.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_client).ok_or(Error::ClientNotFound)?
    }

    /// Fetch a client by its primary id.
    pub async fn get_client_by_id(&self, client_id: Uuid) -> Result<Client> {
        let row = sqlx::query(r"SELECT * FROM oauth_clients WHERE id = ?")
            .bind(client_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_client).ok_or(Error::ClientNotFound)?
    }

    /// Fetch an active client by its application URL (lowercased exact match).
    pub async fn get_client_by_application_url(&self, application_url: &str) -> Result<Client> {
        let row =
            sqlx::query(r"SELECT * FROM oauth_clients WHERE application_url = ? AND active = 1")
                .bind(application_url.to_lowercase())
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(row_to_client).ok_or(Error::ClientNotFound)?
    }

    /// List the clients registered by a user.
    pub async fn get_clients_for_user(&self, user_id: Uuid) -> Result<Vec<Client>> {
        let rows = sqlx::query(r"SELECT * FROM oauth_clients WHERE user_id = ? ORDER BY created_at")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_client).collect()
    }

    /// Delete a client and every token and code issued through it.
    pub async fn delete_client(&self, client_id: Uuid) -> Result<()> {
        let id = client_id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(r"DELETE FROM oauth_access_tokens WHERE client_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(r"DELETE FROM oauth_refresh_tokens WHERE client_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(r"DELETE FROM oauth_authorization_codes WHERE client_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(r"DELETE FROM oauth_clients WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::ClientNotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}

pub(super) fn row_to_client(row: &SqliteRow) -> Result<Client> {
    let id: String = row.get("id");
    let user_id: Option<String> = row.get("user_id");

    Ok(Client {
        id: parse_uuid(&id)?,
        created_at: row.get("created_at"),
        key: row.get("key"),
        secret_hash: row.get("secret_hash"),
        user_id: user_id.as_deref().map(parse_uuid).transpose()?,
        redirect_uri: row.get("redirect_uri"),
        application_name: row.get("application_name"),
        application_hostname: row.get("application_hostname"),
        application_url: row.get("application_url"),
        active: row.get("active"),
    })
}

pub(super) fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("invalid uuid in database: {e}")))
}
