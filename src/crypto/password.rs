// ABOUTME: Password hashing and verification for users and client secrets
// ABOUTME: Prioritized verifier list with bcrypt primary and argon2 legacy fallback
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::errors::Result;
use argon2::password_hash::PasswordHash;
use argon2::{Argon2, PasswordVerifier as _};

/// One password-hash scheme the engine can verify against.
///
/// Verifiers are stateless and reentrant; no shared lock is needed.
pub trait PasswordVerifier: Send + Sync {
    /// Scheme name, for diagnostics only.
    fn scheme(&self) -> &'static str;

    /// Returns true when `password` matches `hash` under this scheme.
    fn verify(&self, hash: &str, password: &str) -> bool;
}

/// Primary scheme: bcrypt, also used for all newly created hashes.
pub struct BcryptVerifier;

impl PasswordVerifier for BcryptVerifier {
    fn scheme(&self) -> &'static str {
        "bcrypt"
    }

    fn verify(&self, hash: &str, password: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

/// Legacy scheme retained for accounts migrated from the previous deployment.
pub struct LegacyArgon2Verifier;

impl PasswordVerifier for LegacyArgon2Verifier {
    fn scheme(&self) -> &'static str {
        "argon2"
    }

    fn verify(&self, hash: &str, password: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

/// Ordered verifier list; first scheme to accept the password wins.
///
/// The order is explicit so a weaker legacy scheme can never shadow the
/// primary one: bcrypt is always tried first.
pub struct PasswordVerifiers {
    verifiers: Vec<Box<dyn PasswordVerifier>>,
}

impl Default for PasswordVerifiers {
    fn default() -> Self {
        Self {
            verifiers: vec![Box::new(BcryptVerifier), Box::new(LegacyArgon2Verifier)],
        }
    }
}

impl PasswordVerifiers {
    /// Verify `password` against `hash`, trying each scheme in priority order.
    pub fn verify(&self, hash: &str, password: &str) -> bool {
        for verifier in &self.verifiers {
            if verifier.verify(hash, password) {
                tracing::trace!(scheme = verifier.scheme(), "password hash matched");
                return true;
            }
        }
        false
    }
}

/// Hash a password or client secret with the primary scheme.
///
/// # Errors
/// Returns an error if bcrypt hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}
