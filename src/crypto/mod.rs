// ABOUTME: Cryptographic primitives for the OAuth2 engine
// ABOUTME: Opaque token generation from the system RNG plus password hashing strategies
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

pub mod password;

use crate::errors::{Error, Result};
use base64::{engine::general_purpose, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};

/// Number of random bytes backing each opaque token value (256 bits).
const TOKEN_BYTES: usize = 32;

/// Generate an opaque, URL-safe token value from the system RNG.
///
/// # Errors
/// Returns an error if the system RNG fails; the engine cannot operate
/// securely without a working random source.
pub fn generate_opaque_token() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes).map_err(|_| {
        tracing::error!("system RNG failure while generating token value");
        Error::Internal("system RNG failure".to_owned())
    })?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
