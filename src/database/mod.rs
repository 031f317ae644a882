// ABOUTME: Database layer for the OAuth2 engine backed by SQLite via sqlx
// ABOUTME: Pool management, schema migrations, and the store modules per entity
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

pub mod clients;
pub mod email_tokens;
pub mod scopes;
pub mod tokens;
pub mod users;

use crate::errors::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Database manager handling all persistence for the engine
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection pool and run migrations.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be created or a migration fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        // An in-memory SQLite database exists per connection, so the pool
        // must be capped at one connection or each query may see a
        // different empty database.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let database = Self { pool };
        database.migrate().await?;

        Ok(database)
    }

    /// Run all schema migrations.
    ///
    /// # Errors
    /// Returns an error if any DDL statement fails.
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_clients().await?;
        self.migrate_users().await?;
        self.migrate_scopes().await?;
        self.migrate_tokens().await?;
        self.migrate_email_tokens().await?;

        tracing::info!("database migrations completed");
        Ok(())
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
