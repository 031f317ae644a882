// ABOUTME: Scope catalog store: the set of grantable scope strings
// ABOUTME: Default-scope resolution and validation of requested scope lists
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::Database;
use crate::errors::Result;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create the scopes table.
    pub(super) async fn migrate_scopes(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_scopes (
                id TEXT PRIMARY KEY,
                scope TEXT UNIQUE NOT NULL,
                description TEXT,
                is_default INTEGER NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Register a grantable scope.
    pub async fn create_scope(
        &self,
        scope: &str,
        description: Option<&str>,
        is_default: bool,
    ) -> Result<()> {
        sqlx::query(
            r"INSERT INTO oauth_scopes (id, scope, description, is_default) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(scope)
        .bind(description)
        .bind(is_default)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Space-joined list of all default scopes.
    pub async fn get_default_scope(&self) -> Result<String> {
        let rows =
            sqlx::query(r"SELECT scope FROM oauth_scopes WHERE is_default = 1 ORDER BY scope")
                .fetch_all(&self.pool)
                .await?;

        let scopes: Vec<String> = rows.iter().map(|row| row.get("scope")).collect();
        Ok(scopes.join(" "))
    }

    /// Whether every space-separated entry of `scope` is in the catalog.
    pub async fn scope_exists(&self, scope: &str) -> Result<bool> {
        let requested: Vec<&str> = scope.split_whitespace().collect();
        if requested.is_empty() {
            return Ok(false);
        }

        // Count catalog rows matching the requested entries; the list is
        // valid only when every entry is known.
        let placeholders = vec!["?"; requested.len()].join(", ");
        let query = format!(
            "SELECT COUNT(*) as count FROM oauth_scopes WHERE scope IN ({placeholders})"
        );

        let mut q = sqlx::query(&query);
        for entry in &requested {
            q = q.bind(*entry);
        }
        let row = q.fetch_one(&self.pool).await?;

        let count: i64 = row.get("count");
        Ok(count == requested.len() as i64)
    }
}
