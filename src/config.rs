// ABOUTME: Environment-driven configuration for the OAuth2 engine
// ABOUTME: Token lifetimes, password policy, and database settings with sane defaults
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::env;
use tracing::warn;

/// Token lifetimes and origin restrictions for the grant machinery.
#[derive(Debug, Clone)]
pub struct OauthConfig {
    /// Access token lifetime in seconds
    pub access_token_lifetime: i64,
    /// Refresh token lifetime in seconds; also the rolling-extension window
    pub refresh_token_lifetime: i64,
    /// Authorization code lifetime in seconds
    pub auth_code_lifetime: i64,
    /// Hostnames allowed when resolving a client by application URL
    pub allowed_origins: Vec<String>,
}

impl Default for OauthConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: 3600,
            refresh_token_lifetime: 1_209_600, // 14 days
            auth_code_lifetime: 3600,
            allowed_origins: Vec::new(),
        }
    }
}

impl OauthConfig {
    /// Load OAuth configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            access_token_lifetime: env_i64(
                "OAUTH_ACCESS_TOKEN_LIFETIME",
                defaults.access_token_lifetime,
            ),
            refresh_token_lifetime: env_i64(
                "OAUTH_REFRESH_TOKEN_LIFETIME",
                defaults.refresh_token_lifetime,
            ),
            auth_code_lifetime: env_i64("OAUTH_AUTH_CODE_LIFETIME", defaults.auth_code_lifetime),
            allowed_origins: env::var("OAUTH_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|origin| origin.trim().to_lowercase())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Password acceptance policy enforced by the user directory.
///
/// Replaces the package-level mutable constants of older deployments: the
/// policy is passed into the directory at construction and never shared.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    /// Minimum password length in bytes
    pub min_length: usize,
    /// Maximum password length in bytes (bcrypt input ceiling)
    pub max_length: usize,
    /// Minimum zxcvbn strength score (0-4)
    pub min_score: u8,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 9,
            max_length: 72,
            min_score: 3,
        }
    }
}

/// Email-token signing settings.
#[derive(Debug, Clone)]
pub struct EmailTokenConfig {
    /// HMAC secret for signed email-token claims
    pub secret_key: String,
    /// Email token lifetime in seconds
    pub lifetime: i64,
}

impl Default for EmailTokenConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            lifetime: 600, // 10 minutes
        }
    }
}

impl EmailTokenConfig {
    /// Load email-token configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            secret_key: env::var("EMAIL_TOKEN_SECRET_KEY").unwrap_or_default(),
            lifetime: env_i64("EMAIL_TOKEN_LIFETIME", defaults.lifetime),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL (`sqlite:` or `sqlite::memory:`)
    pub database_url: String,
    /// Grant and token lifetime settings
    pub oauth: OauthConfig,
    /// Password acceptance policy
    pub password_policy: PasswordPolicy,
    /// Email-token signing settings
    pub email_token: EmailTokenConfig,
}

impl Config {
    /// Load the full engine configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/oauth2-engine.db".to_owned()),
            oauth: OauthConfig::from_env(),
            password_policy: PasswordPolicy::default(),
            email_token: EmailTokenConfig::from_env(),
        }
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid value for {key}: {raw}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}
