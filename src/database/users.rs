// ABOUTME: User store: schema and queries for resource-owner accounts
// ABOUTME: Case-insensitive username lookups and account field updates
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::clients::parse_uuid;
use super::Database;
use crate::errors::{Error, Result};
use crate::models::{AccessRole, User};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create the users table.
    pub(super) async fn migrate_users(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_users (
                id TEXT PRIMARY KEY,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME,
                role TEXT NOT NULL,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT,
                email_confirmed INTEGER NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Whether a user with this username already exists (case-insensitive).
    pub async fn user_exists(&self, username: &str) -> Result<bool> {
        let row = sqlx::query(r"SELECT COUNT(*) as count FROM oauth_users WHERE username = ?")
            .bind(username.to_lowercase())
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    /// Insert a new user row.
    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO oauth_users (
                id, created_at, updated_at, role, username, password_hash, email_confirmed
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(user.id.to_string())
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.role.as_str())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.email_confirmed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch a user by username (case-insensitive).
    pub async fn get_user_by_username(&self, username: &str) -> Result<User> {
        let row = sqlx::query(r"SELECT * FROM oauth_users WHERE username = ?")
            .bind(username.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).ok_or(Error::UserNotFound)?
    }

    /// Fetch a user by primary id.
    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<User> {
        let row = sqlx::query(r"SELECT * FROM oauth_users WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user).ok_or(Error::UserNotFound)?
    }

    /// Replace a user's password hash.
    pub async fn set_user_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE oauth_users SET password_hash = ?, updated_at = ? WHERE id = ?",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound);
        }
        Ok(())
    }

    /// Change a user's username. The caller validates the new value.
    /// The new address starts unconfirmed.
    pub async fn set_user_username(&self, user_id: Uuid, username: &str) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE oauth_users SET username = ?, email_confirmed = 0, updated_at = ?
              WHERE id = ?",
        )
                .bind(username.to_lowercase())
                .bind(Utc::now())
                .bind(user_id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound);
        }
        Ok(())
    }

    /// Mark a user's email address as confirmed.
    pub async fn confirm_user_email(&self, user_id: Uuid) -> Result<()> {
        let result =
            sqlx::query(r"UPDATE oauth_users SET email_confirmed = 1, updated_at = ? WHERE id = ?")
                .bind(Utc::now())
                .bind(user_id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound);
        }
        Ok(())
    }

    /// Delete a user and every token issued to them.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        let id = user_id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(r"DELETE FROM oauth_access_tokens WHERE user_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(r"DELETE FROM oauth_refresh_tokens WHERE user_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(r"DELETE FROM oauth_authorization_codes WHERE user_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(r"DELETE FROM oauth_users WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}

pub(super) fn row_to_user(row: &SqliteRow) -> Result<User> {
    let id: String = row.get("id");
    let role: String = row.get("role");

    Ok(User {
        id: parse_uuid(&id)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        role: AccessRole::from_str(&role)?,
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        email_confirmed: row.get("email_confirmed"),
    })
}
