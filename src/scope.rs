// ABOUTME: Scope resolution against the catalog and subset comparison
// ABOUTME: Space-separated scope strings with catalog-backed defaults
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::database::Database;
use crate::errors::{Error, Result};

/// Resolve a requested scope string against the catalog.
///
/// An absent or empty request resolves to the catalog's default scope. A
/// non-empty request must consist entirely of known scopes or the request
/// is rejected with `InvalidScope`.
///
/// # Errors
/// Returns `InvalidScope` if any requested entry is not in the catalog.
pub async fn resolve_scope(database: &Database, requested: Option<&str>) -> Result<String> {
    match requested {
        Some(scope) if !scope.trim().is_empty() => {
            if database.scope_exists(scope).await? {
                Ok(scope.trim().to_owned())
            } else {
                Err(Error::InvalidScope)
            }
        }
        _ => database.get_default_scope().await,
    }
}

/// Whether every entry of `requested` is also present in `granted`.
#[must_use]
pub fn is_subset(requested: &str, granted: &str) -> bool {
    let granted: Vec<&str> = granted.split_whitespace().collect();
    requested
        .split_whitespace()
        .all(|entry| granted.contains(&entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subset_comparison() {
        assert!(is_subset("read", "read read_write"));
        assert!(is_subset("read read_write", "read_write read"));
        assert!(is_subset("", "read"));
        assert!(!is_subset("read_write", "read"));
        // Entries match whole scope names, never substrings
        assert!(!is_subset("read", "read_write"));
    }
}
