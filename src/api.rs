// ABOUTME: Wire types for the token and introspection endpoints
// ABOUTME: Request and response shapes serialized the way OAuth2 clients expect
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token type reported with every issued access token.
pub const BEARER: &str = "Bearer";

/// Introspection hint naming an access token.
pub const HINT_ACCESS_TOKEN: &str = "access_token";

/// Introspection hint naming a refresh token.
pub const HINT_REFRESH_TOKEN: &str = "refresh_token";

/// A token endpoint request, as decoded from the POST form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    /// Authorization code, for the authorization_code grant
    pub code: Option<String>,
    /// Redirect URI the code was issued against
    pub redirect_uri: Option<String>,
    /// Resource-owner credentials, for the password grant
    pub username: Option<String>,
    pub password: Option<String>,
    /// Refresh token value, for the refresh_token grant
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// A successful token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// An introspection request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntrospectRequest {
    pub token: Option<String>,
    /// Either `access_token` (the default) or `refresh_token`
    pub token_type_hint: Option<String>,
}

/// An introspection response for a token found live in storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntrospectResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expiry as a unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// The client key the token was issued through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_omits_empty_fields() {
        let response = TokenResponse {
            user_id: None,
            access_token: "abc".to_owned(),
            expires_in: 3600,
            token_type: BEARER.to_owned(),
            scope: "read".to_owned(),
            refresh_token: None,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("user_id").is_none());
        assert!(json.get("refresh_token").is_none());
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 3600);
    }

    #[test]
    fn test_introspect_response_omits_absent_fields() {
        let response = IntrospectResponse {
            active: true,
            scope: Some("read".to_owned()),
            token_type: Some(BEARER.to_owned()),
            expires_at: Some(1_700_000_000),
            client_id: Some("test_client_1".to_owned()),
            username: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("username").is_none());
        assert_eq!(json["active"], true);
        assert_eq!(json["expires_at"], 1_700_000_000);
    }
}
