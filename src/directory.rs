// ABOUTME: User directory: account creation, credential checks and profile updates
// ABOUTME: Enforces the password acceptance policy and case-insensitive usernames
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::config::PasswordPolicy;
use crate::crypto::password::{hash_password, PasswordVerifiers};
use crate::database::Database;
use crate::errors::{Error, Result};
use crate::models::{AccessRole, User};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Directory of resource-owner accounts.
pub struct UserDirectory {
    database: Database,
    verifiers: PasswordVerifiers,
    policy: PasswordPolicy,
}

impl UserDirectory {
    #[must_use]
    pub fn new(database: Database, policy: PasswordPolicy) -> Self {
        Self {
            database,
            verifiers: PasswordVerifiers::default(),
            policy,
        }
    }

    /// Create a new user account.
    ///
    /// Validation order is fixed: password present, username present,
    /// password length, password strength, email shape, then availability.
    /// The first failing check is the one reported.
    pub async fn create_user(
        &self,
        role: AccessRole,
        username: &str,
        password: &str,
    ) -> Result<User> {
        if password.is_empty() {
            return Err(Error::PasswordRequired);
        }
        if username.trim().is_empty() {
            return Err(Error::UsernameRequired);
        }
        self.validate_password(password)?;
        if !is_valid_email(username) {
            return Err(Error::EmailInvalid);
        }
        if self.database.user_exists(username).await? {
            return Err(Error::UsernameTaken);
        }

        let user = User {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: None,
            role,
            username: username.to_lowercase(),
            password_hash: Some(hash_password(password)?),
            email_confirmed: false,
        };
        self.database.create_user(&user).await?;

        info!("created user account: {}", user.username);
        Ok(user)
    }

    /// Fetch a user by username.
    pub async fn get_user(&self, username: &str) -> Result<User> {
        self.database.get_user_by_username(username).await
    }

    /// Fetch a user by primary id.
    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<User> {
        self.database.get_user_by_id(user_id).await
    }

    /// Authenticate a user by username and plaintext password.
    ///
    /// # Errors
    /// Returns `UserNotFound` for an unknown username, `UserPasswordNotSet`
    /// for accounts without a usable password, and `InvalidUserPassword`
    /// when the password does not match.
    pub async fn authenticate_user(&self, username: &str, password: &str) -> Result<User> {
        let user = self.database.get_user_by_username(username).await?;
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(Error::UserPasswordNotSet);
        };
        if !self.verifiers.verify(hash, password) {
            return Err(Error::InvalidUserPassword);
        }
        Ok(user)
    }

    /// Replace a user's password after validating it against policy.
    pub async fn set_password(&self, user: &User, new_password: &str) -> Result<()> {
        if new_password.is_empty() {
            return Err(Error::PasswordRequired);
        }
        self.validate_password(new_password)?;

        let hash = hash_password(new_password)?;
        self.database.set_user_password_hash(user.id, &hash).await?;

        info!("password updated for user: {}", user.username);
        Ok(())
    }

    /// Change a user's username to a new email address.
    pub async fn update_username(&self, user: &User, new_username: &str) -> Result<()> {
        if new_username.trim().is_empty() {
            return Err(Error::CannotSetEmptyUsername);
        }
        if !is_valid_email(new_username) {
            return Err(Error::EmailInvalid);
        }
        let lowered = new_username.to_lowercase();
        if lowered != user.username && self.database.user_exists(&lowered).await? {
            return Err(Error::UsernameTaken);
        }

        self.database.set_user_username(user.id, &lowered).await
    }

    /// Mark the user's email address as confirmed.
    pub async fn confirm_email(&self, user: &User) -> Result<()> {
        self.database.confirm_user_email(user.id).await
    }

    /// Delete a user account and every token issued to it.
    pub async fn delete_user(&self, user: &User) -> Result<()> {
        self.database.delete_user(user.id).await?;
        info!("deleted user account: {}", user.username);
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<()> {
        if password.len() < self.policy.min_length {
            return Err(Error::PasswordTooShort(self.policy.min_length));
        }
        if password.len() > self.policy.max_length {
            return Err(Error::PasswordTooLong(self.policy.max_length));
        }
        let score = u8::from(zxcvbn::zxcvbn(password, &[]).score());
        if score < self.policy.min_score {
            return Err(Error::PasswordTooWeak);
        }
        Ok(())
    }
}

/// Minimal shape check for an email address; the confirmation flow is the
/// real proof of deliverability.
fn is_valid_email(candidate: &str) -> bool {
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    if candidate.contains(char::is_whitespace) {
        return false;
    }
    match domain.split_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
