// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Access token lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use tokio::sync::Mutex;

use crate::auth::token::{Grant, TokenResponse};
use crate::auth::{Credentials, Token};
use crate::error::{Error, ParseError, ProtocolError, Result};
use crate::protocol::HttpConfig;

/// Owns the access token of a session.
///
/// [`ensure_valid_token`](Self::ensure_valid_token) may be called from any
/// number of tasks at once. The first caller that finds the token missing or
/// about to expire performs the exchange while holding the token lock; the
/// other callers wait on the lock and then receive the outcome of that
/// exchange, so at most one exchange is ever in flight. A failed exchange is
/// shared the same way: callers that were already waiting get its error
/// instead of starting another attempt. Calls made after the failure try again.
///
/// - No token: password grant.
/// - Remaining lifetime below [`HttpConfig::min_token_lifetime`]: refresh grant.
/// - Otherwise the current token is returned unchanged.
///
/// # Examples
///
/// ```no_run
/// use smartbox_lib::auth::{AuthTokenManager, Credentials};
/// use smartbox_lib::protocol::HttpConfig;
///
/// # async fn example() -> smartbox_lib::Result<()> {
/// let config = HttpConfig::new();
/// let credentials = Credentials::new(
///     "https://api-helki.helki.com",
///     "c2VjcmV0",
///     "user@example.com",
///     "password",
/// );
/// let auth = AuthTokenManager::new(credentials, &config, config.build_client()?);
///
/// let token = auth.ensure_valid_token().await?;
/// println!("token expires at {}", token.expires_at());
/// # Ok(())
/// # }
/// ```
pub struct AuthTokenManager {
    credentials: Credentials,
    config: HttpConfig,
    client: Client,
    slot: Mutex<TokenSlot>,
    attempts: AtomicU64,
    exchanges: AtomicU64,
}

#[derive(Default)]
struct TokenSlot {
    token: Option<Arc<Token>>,
    last_failure: Option<ExchangeFailure>,
}

/// Outcome of a failed exchange, kept for the callers waiting on it.
#[derive(Debug, Clone)]
enum ExchangeFailure {
    Rejected,
    Unavailable(String),
    Malformed(String),
}

impl ExchangeFailure {
    fn from_error(err: &Error) -> Self {
        match err {
            Error::Protocol(ProtocolError::AuthenticationFailed) => Self::Rejected,
            Error::Protocol(ProtocolError::ServiceUnavailable(message)) => {
                Self::Unavailable(message.clone())
            }
            Error::Parse(ParseError::MalformedResponse(message)) => {
                Self::Malformed(message.clone())
            }
            other => Self::Unavailable(other.to_string()),
        }
    }

    fn to_error(&self) -> Error {
        match self {
            Self::Rejected => ProtocolError::AuthenticationFailed.into(),
            Self::Unavailable(message) => ProtocolError::ServiceUnavailable(message.clone()).into(),
            Self::Malformed(message) => ParseError::MalformedResponse(message.clone()).into(),
        }
    }
}

impl AuthTokenManager {
    /// Creates a token manager. No request is made until a token is needed.
    #[must_use]
    pub fn new(credentials: Credentials, config: &HttpConfig, client: Client) -> Self {
        Self {
            credentials,
            config: config.clone(),
            client,
            slot: Mutex::new(TokenSlot::default()),
            attempts: AtomicU64::new(0),
            exchanges: AtomicU64::new(0),
        }
    }

    /// Returns the credentials.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the minimum remaining lifetime before a token is refreshed.
    #[must_use]
    pub fn min_token_lifetime(&self) -> Duration {
        self.config.min_token_lifetime()
    }

    /// Returns the number of successful token exchanges so far.
    #[must_use]
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    /// Returns the number of token exchanges attempted, failed ones included.
    #[must_use]
    pub fn attempt_count(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Returns the current token without checking its expiry.
    pub async fn current_token(&self) -> Option<Arc<Token>> {
        self.slot.lock().await.token.clone()
    }

    /// Drops the current token so the next call starts with a password grant.
    pub async fn invalidate(&self) {
        if self.slot.lock().await.token.take().is_some() {
            tracing::debug!("Access token invalidated");
        }
    }

    /// Returns a token valid for at least the minimum lifetime.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::ServiceUnavailable`] if the token endpoint cannot be reached
    /// - [`ProtocolError::AuthenticationFailed`] if the grant is rejected
    /// - [`ParseError::MalformedResponse`] if the token response cannot be decoded
    ///
    /// A rejected refresh grant also drops the stored token. A connectivity
    /// failure keeps it, so a later call can still refresh.
    ///
    /// Callers that queued while an exchange was running receive its error
    /// if it failed.
    pub async fn ensure_valid_token(&self) -> Result<Arc<Token>> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;

        if self.attempts.load(Ordering::Acquire) != seen
            && let Some(failure) = &slot.last_failure
        {
            tracing::debug!(?failure, "Sharing failed token exchange with waiting caller");
            return Err(failure.to_error());
        }

        let grant = match slot.token.as_ref() {
            None => Grant::password(&self.credentials),
            Some(token) if token.expires_within(self.config.min_token_lifetime()) => {
                tracing::debug!(expires_at = %token.expires_at(), "Access token near expiry, refreshing");
                Grant::refresh(token)
            }
            Some(token) => return Ok(Arc::clone(token)),
        };

        let outcome = self.exchange(&grant).await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok(token) => {
                let token = Arc::new(token);
                slot.token = Some(Arc::clone(&token));
                slot.last_failure = None;
                Ok(token)
            }
            Err(err) => {
                if matches!(grant, Grant::RefreshToken(_)) && err.is_authentication_failed() {
                    tracing::warn!("Refresh token rejected, re-authenticating on next request");
                    slot.token = None;
                }
                slot.last_failure = Some(ExchangeFailure::from_error(&err));
                Err(err)
            }
        }
    }

    async fn exchange(&self, grant: &Grant) -> Result<Token> {
        let url = format!("{}/client/token", self.credentials.api_base());

        tracing::debug!(url = %url, grant = grant.name(), "Requesting access token");

        let request = self
            .client
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("Basic {}", self.credentials.basic_auth()),
            )
            .form(&grant.form());

        let response = self
            .config
            .apply_headers(request)
            .send()
            .await
            .map_err(|e| ProtocolError::from_send(&e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProtocolError::ServiceUnavailable(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            ))
            .into());
        }
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), grant = grant.name(), "Token request rejected");
            return Err(ProtocolError::AuthenticationFailed.into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProtocolError::from_send(&e))?;
        let response: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
            Error::from(ParseError::MalformedResponse(format!(
                "invalid token response: {e}"
            )))
        })?;

        let lifetime = response.expires_in;
        let min_lifetime = self.config.min_token_lifetime().as_secs();
        if u64::try_from(lifetime).ok().is_none_or(|secs| secs < min_lifetime) {
            tracing::warn!(
                expires_in = lifetime,
                min_lifetime,
                "Token lifetime is below the minimum, it will be refreshed on the next request"
            );
        }

        let token = Token::from_response(response, Utc::now());
        self.exchanges.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            grant = grant.name(),
            expires_at = %token.expires_at(),
            "Authenticated session"
        );

        Ok(token)
    }
}

impl std::fmt::Debug for AuthTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokenManager")
            .field("credentials", &self.credentials)
            .field("min_token_lifetime", &self.config.min_token_lifetime())
            .field("attempts", &self.attempt_count())
            .field("exchanges", &self.exchange_count())
            .finish_non_exhaustive()
    }
}
