// ABOUTME: Error taxonomy for the OAuth2 engine with HTTP status mapping
// ABOUTME: Typed grant, credential, policy and storage failures for the token endpoint
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type returned by every engine component.
///
/// Variants map one-to-one onto the failure modes the token endpoint has to
/// distinguish: not-found, expired, invalid-credential, policy-violation,
/// malformed-input and storage-failure. The engine never retries internally;
/// the only retryable condition is [`Error::DuplicateToken`], where the caller
/// may re-issue with a freshly generated opaque value.
#[derive(Debug, Error)]
pub enum Error {
    // Not found
    #[error("Client not found")]
    ClientNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Role not found")]
    RoleNotFound,
    #[error("Access token not found")]
    AccessTokenNotFound,
    #[error("Refresh token not found")]
    RefreshTokenNotFound,
    #[error("Authorization code not found")]
    AuthorizationCodeNotFound,
    #[error("Email token not found")]
    EmailTokenNotFound,

    // Expired
    #[error("Access token expired")]
    AccessTokenExpired,
    #[error("Refresh token expired")]
    RefreshTokenExpired,
    #[error("Authorization code expired")]
    AuthorizationCodeExpired,

    // Invalid credentials
    #[error("Invalid client secret")]
    InvalidClientSecret,
    #[error("Invalid user password")]
    InvalidUserPassword,
    #[error("Invalid username or password")]
    InvalidUsernameOrPassword,
    #[error("User password not set")]
    UserPasswordNotSet,

    // Policy violations
    #[error("Client ID taken")]
    ClientIdTaken,
    #[error("Email is not available")]
    UsernameTaken,
    #[error("Password is required")]
    PasswordRequired,
    #[error("Email is required")]
    UsernameRequired,
    #[error("Password must be at least {0} characters long")]
    PasswordTooShort(usize),
    #[error("Password must be at maximum {0} characters long")]
    PasswordTooLong(usize),
    #[error("Password is too weak")]
    PasswordTooWeak,
    #[error("Not a valid email")]
    EmailInvalid,
    #[error("Cannot set empty username")]
    CannotSetEmptyUsername,
    #[error("Requested scope cannot be greater")]
    RequestedScopeCannotBeGreater,

    // Malformed input
    #[error("Invalid grant type")]
    InvalidGrantType,
    #[error("Invalid scope")]
    InvalidScope,
    #[error("Invalid redirect URI")]
    InvalidRedirectUri,
    #[error("Token missing")]
    TokenMissing,
    #[error("Invalid token hint")]
    TokenHintInvalid,
    #[error("Email token is invalid or has expired")]
    EmailTokenInvalid,
    #[error("Email token link is invalid")]
    EmailTokenLinkInvalid,

    // Storage failures
    #[error("Duplicate token value")]
    DuplicateToken,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// HTTP status code the token endpoint should respond with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ClientNotFound
            | Self::UserNotFound
            | Self::RoleNotFound
            | Self::AccessTokenNotFound
            | Self::RefreshTokenNotFound
            | Self::AuthorizationCodeNotFound
            | Self::EmailTokenNotFound => 404,

            Self::InvalidClientSecret
            | Self::InvalidUserPassword
            | Self::InvalidUsernameOrPassword
            | Self::UserPasswordNotSet => 401,

            Self::AccessTokenExpired
            | Self::RefreshTokenExpired
            | Self::AuthorizationCodeExpired
            | Self::ClientIdTaken
            | Self::UsernameTaken
            | Self::PasswordRequired
            | Self::UsernameRequired
            | Self::PasswordTooShort(_)
            | Self::PasswordTooLong(_)
            | Self::PasswordTooWeak
            | Self::EmailInvalid
            | Self::CannotSetEmptyUsername
            | Self::RequestedScopeCannotBeGreater
            | Self::InvalidGrantType
            | Self::InvalidScope
            | Self::InvalidRedirectUri
            | Self::TokenMissing
            | Self::TokenHintInvalid
            | Self::EmailTokenInvalid
            | Self::EmailTokenLinkInvalid => 400,

            Self::DuplicateToken
            | Self::Database(_)
            | Self::PasswordHash(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Whether the caller may retry the operation with a fresh token value.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DuplicateToken)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

/// Maps a failed insert to the retryable duplicate condition when the token
/// value collided on its unique constraint.
pub(crate) fn map_token_insert_error(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::DuplicateToken,
        _ => Error::Database(err),
    }
}
