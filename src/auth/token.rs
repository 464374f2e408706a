// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bearer tokens and token grants.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::auth::Credentials;

/// An access token issued by the API.
///
/// Tokens are immutable; a refresh produces a new `Token`.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    access_token: String,
    refresh_token: String,
    token_type: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Token {
    pub(crate) fn from_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let expires_at = TimeDelta::try_seconds(response.expires_in)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response.token_type,
            issued_at,
            expires_at,
        }
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Returns the token type reported by the server (usually `bearer`).
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Returns when the token was received.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns when the token expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the remaining lifetime, negative once expired.
    #[must_use]
    pub fn remaining(&self) -> TimeDelta {
        self.expires_at - Utc::now()
    }

    /// Returns `true` if the token expires within `window`.
    #[must_use]
    pub fn expires_within(&self, window: Duration) -> bool {
        self.remaining() < TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX)
    }

    /// Returns the `Authorization` header value for API requests.
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Body of a successful token response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// OAuth grant sent to the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum Grant {
    Password { username: String, password: String },
    RefreshToken(String),
}

impl Grant {
    pub fn password(credentials: &Credentials) -> Self {
        Self::Password {
            username: credentials.username().to_string(),
            password: credentials.password().to_string(),
        }
    }

    pub fn refresh(token: &Token) -> Self {
        Self::RefreshToken(token.refresh_token().to_string())
    }

    /// Returns the `grant_type` value.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::RefreshToken(_) => "refresh_token",
        }
    }

    /// Returns the form fields for the token request.
    pub fn form(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::Password { username, password } => vec![
                ("grant_type", self.name()),
                ("username", username.as_str()),
                ("password", password.as_str()),
            ],
            Self::RefreshToken(refresh_token) => vec![
                ("grant_type", self.name()),
                ("refresh_token", refresh_token.as_str()),
            ],
        }
    }
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grant({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in,
            token_type: "bearer".to_string(),
        }
    }

    #[test]
    fn expiry_is_computed_from_issue_time() {
        let issued_at = Utc::now();
        let token = Token::from_response(response(3600), issued_at);
        assert_eq!(token.expires_at() - token.issued_at(), TimeDelta::seconds(3600));
        assert_eq!(token.bearer(), "Bearer access");
    }

    #[test]
    fn expires_within_window() {
        let token = Token::from_response(response(30), Utc::now());
        assert!(token.expires_within(Duration::from_secs(60)));
        assert!(!token.expires_within(Duration::from_secs(10)));

        let fresh = Token::from_response(response(3600), Utc::now());
        assert!(!fresh.expires_within(Duration::from_secs(60)));
    }

    #[test]
    fn debug_hides_tokens() {
        let token = Token::from_response(response(3600), Utc::now());
        let debug = format!("{token:?}");
        assert!(!debug.contains("access"));
        assert!(!debug.contains("refresh"));
    }

    #[test]
    fn grant_forms() {
        let credentials = Credentials::new("http://localhost", "secret", "alice", "pw");
        let password = Grant::password(&credentials);
        assert_eq!(
            password.form(),
            vec![
                ("grant_type", "password"),
                ("username", "alice"),
                ("password", "pw")
            ]
        );

        let token = Token::from_response(response(3600), Utc::now());
        let refresh = Grant::refresh(&token);
        assert_eq!(
            refresh.form(),
            vec![("grant_type", "refresh_token"), ("refresh_token", "refresh")]
        );
        assert_eq!(format!("{refresh:?}"), "Grant(refresh_token)");
    }
}
