// ABOUTME: Email token store: rows backing signed password-reset and confirmation links
// ABOUTME: Lookup by reference plus delivery bookkeeping and retention cleanup
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::clients::parse_uuid;
use super::Database;
use crate::errors::{Error, Result};
use crate::models::EmailToken;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create the email tokens table.
    pub(super) async fn migrate_email_tokens(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_email_tokens (
                id TEXT PRIMARY KEY,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                reference TEXT UNIQUE NOT NULL,
                email_sent INTEGER NOT NULL DEFAULT 0,
                email_sent_at DATETIME,
                expires_at DATETIME NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a new email token row.
    pub async fn create_email_token(&self, token: &EmailToken) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO oauth_email_tokens (
                id, created_at, reference, email_sent, email_sent_at, expires_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(token.id.to_string())
        .bind(token.created_at)
        .bind(token.reference.to_string())
        .bind(token.email_sent)
        .bind(token.email_sent_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch an email token row by the reference embedded in the signed claim.
    pub async fn get_email_token_by_reference(&self, reference: Uuid) -> Result<EmailToken> {
        let row = sqlx::query(r"SELECT * FROM oauth_email_tokens WHERE reference = ?")
            .bind(reference.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(row_to_email_token)
            .ok_or(Error::EmailTokenNotFound)?
    }

    /// Record that the email carrying this token was handed to delivery.
    pub async fn mark_email_token_sent(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE oauth_email_tokens SET email_sent = 1, email_sent_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::EmailTokenNotFound);
        }
        Ok(())
    }

    /// Delete an email token row, invalidating the link it backs.
    pub async fn delete_email_token(&self, id: Uuid) -> Result<()> {
        sqlx::query(r"DELETE FROM oauth_email_tokens WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete rows whose expiry is older than `cutoff`.
    pub async fn clear_expired_email_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(r"DELETE FROM oauth_email_tokens WHERE expires_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn row_to_email_token(row: &SqliteRow) -> Result<EmailToken> {
    let id: String = row.get("id");
    let reference: String = row.get("reference");

    Ok(EmailToken {
        id: parse_uuid(&id)?,
        created_at: row.get("created_at"),
        reference: parse_uuid(&reference)?,
        email_sent: row.get("email_sent"),
        email_sent_at: row.get("email_sent_at"),
        expires_at: row.get("expires_at"),
    })
}
