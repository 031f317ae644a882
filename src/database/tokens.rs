// ABOUTME: Token store: access tokens, refresh tokens and authorization codes
// ABOUTME: Transactional issuance keeping one live refresh token per pairing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::clients::parse_uuid;
use super::Database;
use crate::errors::{map_token_insert_error, Error, Result};
use crate::models::{AccessToken, AuthorizationCode, RefreshToken, UserSession};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

impl Database {
    /// Create the access token, refresh token and authorization code tables.
    pub(super) async fn migrate_tokens(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_access_tokens (
                id TEXT PRIMARY KEY,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                client_id TEXT NOT NULL,
                user_id TEXT,
                token TEXT UNIQUE NOT NULL,
                expires_at DATETIME NOT NULL,
                scope TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"CREATE INDEX IF NOT EXISTS idx_oauth_access_tokens_pairing
              ON oauth_access_tokens(client_id, user_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_refresh_tokens (
                id TEXT PRIMARY KEY,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                client_id TEXT NOT NULL,
                user_id TEXT,
                token TEXT UNIQUE NOT NULL,
                expires_at DATETIME NOT NULL,
                scope TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"CREATE INDEX IF NOT EXISTS idx_oauth_refresh_tokens_pairing
              ON oauth_refresh_tokens(client_id, user_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_authorization_codes (
                id TEXT PRIMARY KEY,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                client_id TEXT NOT NULL,
                user_id TEXT,
                code TEXT UNIQUE NOT NULL,
                redirect_uri TEXT,
                expires_at DATETIME NOT NULL,
                scope TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store an access token, purging expired tokens for the same
    /// (client, user) pairing in the same transaction.
    pub async fn store_access_token(&self, token: &AccessToken) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        purge_expired_access_tokens(&mut tx, token.client_id, token.user_id, Utc::now()).await?;
        insert_access_token(&mut tx, token).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Return the pairing's live refresh token, or persist `candidate` when
    /// none exists or the existing one has expired.
    ///
    /// A live token is returned unchanged, so repeated grants to the same
    /// pairing keep handing out the same refresh token value.
    pub async fn get_or_create_refresh_token(
        &self,
        candidate: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken> {
        let mut tx = self.pool.begin().await?;
        let token = get_or_create_refresh_token_tx(&mut tx, candidate, now).await?;
        tx.commit().await?;
        Ok(token)
    }

    /// Issue an access token and resolve the pairing's refresh token in one
    /// transaction. Returns the refresh token actually in effect.
    pub async fn issue_token_pair(
        &self,
        access: &AccessToken,
        refresh_candidate: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken> {
        let mut tx = self.pool.begin().await?;
        purge_expired_access_tokens(&mut tx, access.client_id, access.user_id, now).await?;
        insert_access_token(&mut tx, access).await?;
        let refresh = get_or_create_refresh_token_tx(&mut tx, refresh_candidate, now).await?;
        tx.commit().await?;
        Ok(refresh)
    }

    /// Consume an authorization code and issue the token pair atomically.
    ///
    /// The code row is deleted first, so a code can never be redeemed twice
    /// even when two exchanges race.
    pub async fn redeem_authorization_code(
        &self,
        code_id: Uuid,
        access: &AccessToken,
        refresh_candidate: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(r"DELETE FROM oauth_authorization_codes WHERE id = ?")
            .bind(code_id.to_string())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::AuthorizationCodeNotFound);
        }

        purge_expired_access_tokens(&mut tx, access.client_id, access.user_id, now).await?;
        insert_access_token(&mut tx, access).await?;
        let refresh = get_or_create_refresh_token_tx(&mut tx, refresh_candidate, now).await?;
        tx.commit().await?;
        Ok(refresh)
    }

    /// Store an authorization code.
    pub async fn store_authorization_code(&self, code: &AuthorizationCode) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO oauth_authorization_codes (
                id, created_at, client_id, user_id, code, redirect_uri, expires_at, scope
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(code.id.to_string())
        .bind(code.created_at)
        .bind(code.client_id.to_string())
        .bind(code.user_id.map(|id| id.to_string()))
        .bind(&code.code)
        .bind(&code.redirect_uri)
        .bind(code.expires_at)
        .bind(&code.scope)
        .execute(&self.pool)
        .await
        .map_err(map_token_insert_error)?;

        Ok(())
    }

    /// Fetch an authorization code by its value for a given client.
    pub async fn get_authorization_code(
        &self,
        client_id: Uuid,
        code: &str,
    ) -> Result<AuthorizationCode> {
        let row = sqlx::query(
            r"SELECT * FROM oauth_authorization_codes WHERE client_id = ? AND code = ?",
        )
        .bind(client_id.to_string())
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(row_to_authorization_code)
            .ok_or(Error::AuthorizationCodeNotFound)?
    }

    /// Fetch an access token by its opaque value.
    pub async fn get_access_token_by_value(&self, token: &str) -> Result<AccessToken> {
        let row = sqlx::query(r"SELECT * FROM oauth_access_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(row_to_access_token)
            .ok_or(Error::AccessTokenNotFound)?
    }

    /// Fetch a refresh token by its opaque value for a given client.
    pub async fn get_refresh_token_by_value(
        &self,
        client_id: Uuid,
        token: &str,
    ) -> Result<RefreshToken> {
        let row =
            sqlx::query(r"SELECT * FROM oauth_refresh_tokens WHERE client_id = ? AND token = ?")
                .bind(client_id.to_string())
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref()
            .map(row_to_refresh_token)
            .ok_or(Error::RefreshTokenNotFound)?
    }

    /// Push the pairing's refresh token expiry forward to `new_expires_at`.
    ///
    /// The update is monotonic: a token whose expiry is already at or past
    /// the new value is left untouched, so concurrent extensions can only
    /// ever lengthen the session.
    pub async fn extend_refresh_token(
        &self,
        client_id: Uuid,
        user_id: Option<Uuid>,
        new_expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = match user_id {
            Some(_) => {
                r"UPDATE oauth_refresh_tokens SET expires_at = ?
                  WHERE client_id = ? AND user_id = ? AND expires_at < ?"
            }
            None => {
                r"UPDATE oauth_refresh_tokens SET expires_at = ?
                  WHERE client_id = ? AND user_id IS NULL AND expires_at < ?"
            }
        };

        let mut q = sqlx::query(query)
            .bind(new_expires_at)
            .bind(client_id.to_string());
        if let Some(user_id) = user_id {
            q = q.bind(user_id.to_string());
        }
        q.bind(new_expires_at).execute(&self.pool).await?;

        Ok(())
    }

    /// Delete all tokens belonging to the pairings a session's token values
    /// resolve to. Values that resolve to nothing are skipped silently.
    pub async fn clear_user_tokens(&self, session: &UserSession) -> Result<()> {
        let refresh_row = sqlx::query(r"SELECT * FROM oauth_refresh_tokens WHERE token = ?")
            .bind(&session.refresh_token)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = refresh_row {
            let token = row_to_refresh_token(&row)?;
            delete_tokens_for_pairing(
                &self.pool,
                "oauth_refresh_tokens",
                token.client_id,
                token.user_id,
            )
            .await?;
        }

        let access_row = sqlx::query(r"SELECT * FROM oauth_access_tokens WHERE token = ?")
            .bind(&session.access_token)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = access_row {
            let token = row_to_access_token(&row)?;
            delete_tokens_for_pairing(
                &self.pool,
                "oauth_access_tokens",
                token.client_id,
                token.user_id,
            )
            .await?;
        }

        Ok(())
    }
}

async fn purge_expired_access_tokens(
    conn: &mut SqliteConnection,
    client_id: Uuid,
    user_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<()> {
    let query = match user_id {
        Some(_) => {
            r"DELETE FROM oauth_access_tokens
              WHERE client_id = ? AND user_id = ? AND expires_at <= ?"
        }
        None => {
            r"DELETE FROM oauth_access_tokens
              WHERE client_id = ? AND user_id IS NULL AND expires_at <= ?"
        }
    };

    let mut q = sqlx::query(query).bind(client_id.to_string());
    if let Some(user_id) = user_id {
        q = q.bind(user_id.to_string());
    }
    q.bind(now).execute(conn).await?;

    Ok(())
}

async fn insert_access_token(conn: &mut SqliteConnection, token: &AccessToken) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO oauth_access_tokens (
            id, created_at, client_id, user_id, token, expires_at, scope
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(token.id.to_string())
    .bind(token.created_at)
    .bind(token.client_id.to_string())
    .bind(token.user_id.map(|id| id.to_string()))
    .bind(&token.token)
    .bind(token.expires_at)
    .bind(&token.scope)
    .execute(conn)
    .await
    .map_err(map_token_insert_error)?;

    Ok(())
}

async fn insert_refresh_token(conn: &mut SqliteConnection, token: &RefreshToken) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO oauth_refresh_tokens (
            id, created_at, client_id, user_id, token, expires_at, scope
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(token.id.to_string())
    .bind(token.created_at)
    .bind(token.client_id.to_string())
    .bind(token.user_id.map(|id| id.to_string()))
    .bind(&token.token)
    .bind(token.expires_at)
    .bind(&token.scope)
    .execute(conn)
    .await
    .map_err(map_token_insert_error)?;

    Ok(())
}

async fn get_or_create_refresh_token_tx(
    conn: &mut SqliteConnection,
    candidate: RefreshToken,
    now: DateTime<Utc>,
) -> Result<RefreshToken> {
    let query = match candidate.user_id {
        Some(_) => r"SELECT * FROM oauth_refresh_tokens WHERE client_id = ? AND user_id = ?",
        None => r"SELECT * FROM oauth_refresh_tokens WHERE client_id = ? AND user_id IS NULL",
    };

    let mut q = sqlx::query(query).bind(candidate.client_id.to_string());
    if let Some(user_id) = candidate.user_id {
        q = q.bind(user_id.to_string());
    }
    let existing = q.fetch_optional(&mut *conn).await?;

    if let Some(row) = existing {
        let existing = row_to_refresh_token(&row)?;
        if !existing.is_expired(now) {
            return Ok(existing);
        }

        sqlx::query(r"DELETE FROM oauth_refresh_tokens WHERE id = ?")
            .bind(existing.id.to_string())
            .execute(&mut *conn)
            .await?;
    }

    insert_refresh_token(conn, &candidate).await?;
    Ok(candidate)
}

async fn delete_tokens_for_pairing(
    pool: &sqlx::SqlitePool,
    table: &str,
    client_id: Uuid,
    user_id: Option<Uuid>,
) -> Result<()> {
    let query = match user_id {
        Some(_) => format!("DELETE FROM {table} WHERE client_id = ? AND user_id = ?"),
        None => format!("DELETE FROM {table} WHERE client_id = ? AND user_id IS NULL"),
    };

    let mut q = sqlx::query(&query).bind(client_id.to_string());
    if let Some(user_id) = user_id {
        q = q.bind(user_id.to_string());
    }
    q.execute(pool).await?;

    Ok(())
}

fn row_to_access_token(row: &SqliteRow) -> Result<AccessToken> {
    let id: String = row.get("id");
    let client_id: String = row.get("client_id");
    let user_id: Option<String> = row.get("user_id");

    Ok(AccessToken {
        id: parse_uuid(&id)?,
        created_at: row.get("created_at"),
        client_id: parse_uuid(&client_id)?,
        user_id: user_id.as_deref().map(parse_uuid).transpose()?,
        token: row.get("token"),
        expires_at: row.get("expires_at"),
        scope: row.get("scope"),
    })
}

fn row_to_refresh_token(row: &SqliteRow) -> Result<RefreshToken> {
    let id: String = row.get("id");
    let client_id: String = row.get("client_id");
    let user_id: Option<String> = row.get("user_id");

    Ok(RefreshToken {
        id: parse_uuid(&id)?,
        created_at: row.get("created_at"),
        client_id: parse_uuid(&client_id)?,
        user_id: user_id.as_deref().map(parse_uuid).transpose()?,
        token: row.get("token"),
        expires_at: row.get("expires_at"),
        scope: row.get("scope"),
    })
}

fn row_to_authorization_code(row: &SqliteRow) -> Result<AuthorizationCode> {
    let id: String = row.get("id");
    let client_id: String = row.get("client_id");
    let user_id: Option<String> = row.get("user_id");

    Ok(AuthorizationCode {
        id: parse_uuid(&id)?,
        created_at: row.get("created_at"),
        client_id: parse_uuid(&client_id)?,
        user_id: user_id.as_deref().map(parse_uuid).transpose()?,
        code: row.get("code"),
        redirect_uri: row.get("redirect_uri"),
        expires_at: row.get("expires_at"),
        scope: row.get("scope"),
    })
}
