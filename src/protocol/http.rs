// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport for the smartbox REST API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::AuthTokenManager;
use crate::error::{ParseError, ProtocolError, Result};

// ============================================================================
// HttpConfig - Settings shared by REST and token requests
// ============================================================================

/// HTTP settings for a session.
///
/// # Examples
///
/// ```
/// use smartbox_lib::protocol::HttpConfig;
/// use std::time::Duration;
///
/// // Defaults
/// let config = HttpConfig::new();
/// assert_eq!(config.min_token_lifetime(), Duration::from_secs(60));
///
/// // With all options
/// let config = HttpConfig::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_min_token_lifetime(Duration::from_secs(120))
///     .with_serial_id(7)
///     .with_referer("https://remotecontrol.elnur.es/");
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    timeout: Duration,
    min_token_lifetime: Duration,
    serial_id: Option<u32>,
    referer: Option<String>,
}

impl HttpConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default minimum remaining token lifetime before a refresh.
    pub const DEFAULT_MIN_TOKEN_LIFETIME: Duration = Duration::from_secs(60);

    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            min_token_lifetime: Self::DEFAULT_MIN_TOKEN_LIFETIME,
            serial_id: None,
            referer: None,
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the minimum remaining token lifetime before a refresh.
    #[must_use]
    pub fn with_min_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.min_token_lifetime = lifetime;
        self
    }

    /// Sets the `x-serialid` header sent with every request.
    #[must_use]
    pub fn with_serial_id(mut self, serial_id: u32) -> Self {
        self.serial_id = Some(serial_id);
        self
    }

    /// Sets the `x-referer` header sent with every request.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the minimum remaining token lifetime.
    #[must_use]
    pub fn min_token_lifetime(&self) -> Duration {
        self.min_token_lifetime
    }

    /// Returns the serial id header value.
    #[must_use]
    pub fn serial_id(&self) -> Option<u32> {
        self.serial_id
    }

    /// Returns the referer header value.
    #[must_use]
    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    /// Builds an HTTP client with this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn build_client(&self) -> std::result::Result<Client, ProtocolError> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(ProtocolError::Http)
    }

    /// Adds the optional vendor headers to a request.
    pub(crate) fn apply_headers(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(serial_id) = self.serial_id {
            request = request.header("x-serialid", serial_id.to_string());
        }
        if let Some(referer) = &self.referer {
            request = request.header("x-referer", referer);
        }
        request
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ApiTransport - Authenticated JSON requests
// ============================================================================

/// Issues authenticated requests against the REST API.
///
/// Every request first obtains a valid token from the [`AuthTokenManager`],
/// so concurrent requests share one token exchange. Failures are classified
/// as follows:
///
/// - no response (connection refused, timeout): [`ProtocolError::ServiceUnavailable`]
/// - HTTP 401: [`ProtocolError::AuthenticationFailed`], and the token is dropped
/// - any other non-success status: [`ProtocolError::Rejected`]
/// - undecodable body: [`ParseError::MalformedResponse`]
#[derive(Debug, Clone)]
pub struct ApiTransport {
    client: Client,
    auth: Arc<AuthTokenManager>,
    config: HttpConfig,
}

impl ApiTransport {
    /// API version prefix of every REST path.
    pub const API_PREFIX: &'static str = "api/v2";

    /// Creates a transport sharing `client` with the token manager.
    #[must_use]
    pub fn new(auth: Arc<AuthTokenManager>, client: Client, config: HttpConfig) -> Self {
        Self {
            client,
            auth,
            config,
        }
    }

    /// Returns the token manager.
    #[must_use]
    pub fn auth(&self) -> &Arc<AuthTokenManager> {
        &self.auth
    }

    /// Returns the HTTP configuration.
    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.auth.credentials().api_base()
    }

    /// Builds the URL of an API path such as `devs`.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.api_base(),
            Self::API_PREFIX,
            path.trim_start_matches('/')
        )
    }

    /// Sends an authenticated `GET` and returns the JSON body.
    ///
    /// # Errors
    ///
    /// Returns error if authentication, the request or decoding fails.
    pub async fn get(&self, path: &str) -> Result<Value> {
        let url = self.api_url(path);
        tracing::debug!(url = %url, "Sending GET request");
        let request = self.authorized(self.client.get(&url)).await?;
        self.send(request).await
    }

    /// Sends an authenticated `GET` and decodes the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns error if authentication, the request or decoding fails.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.get(path).await?;
        decode(path, body)
    }

    /// Sends an authenticated `POST` with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns error if authentication, the request or decoding fails.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let url = self.api_url(path);
        let payload = serde_json::to_string(body).map_err(ParseError::Json)?;
        tracing::debug!(url = %url, body = %payload, "Sending POST request");
        let request = self
            .authorized(self.client.post(&url))
            .await?
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        self.send(request).await
    }

    /// Sends an unauthenticated `GET` to a path relative to the API base.
    ///
    /// # Errors
    ///
    /// Returns error if the request or decoding fails.
    pub async fn get_public(&self, path: &str) -> Result<Value> {
        let url = format!("{}/{}", self.api_base(), path.trim_start_matches('/'));
        tracing::debug!(url = %url, "Sending unauthenticated GET request");
        let request = self.config.apply_headers(self.client.get(&url));
        self.send(request).await
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.auth.ensure_valid_token().await?;
        Ok(self
            .config
            .apply_headers(request)
            .header(AUTHORIZATION, token.bearer()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| ProtocolError::from_send(&e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.auth.invalidate().await;
            return Err(ProtocolError::AuthenticationFailed.into());
        }
        if !status.is_success() {
            return Err(rejection(response).await.into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProtocolError::from_send(&e))?;

        tracing::debug!(status = status.as_u16(), bytes = body.len(), "Received HTTP response");

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body)
            .map_err(|e| ParseError::MalformedResponse(format!("invalid JSON body: {e}")).into())
    }
}

async fn rejection(response: Response) -> ProtocolError {
    let status = response.status();
    let reason = status.canonical_reason().unwrap_or("Unknown");
    let message = match response.text().await {
        Ok(text) if !text.trim().is_empty() => format!("{reason}: {}", text.trim()),
        _ => reason.to_string(),
    };
    tracing::warn!(status = status.as_u16(), message = %message, "Request rejected");
    ProtocolError::Rejected {
        status: status.as_u16(),
        message,
    }
}

/// Decodes a response body into a typed model.
pub(crate) fn decode<T: DeserializeOwned>(path: &str, body: Value) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|e| ParseError::MalformedResponse(format!("{path}: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;

    fn transport(api_base: &str) -> ApiTransport {
        let config = HttpConfig::new();
        let client = config.build_client().unwrap();
        let credentials = Credentials::new(api_base, "secret", "user", "pass");
        let auth = Arc::new(AuthTokenManager::new(credentials, &config, client.clone()));
        ApiTransport::new(auth, client, config)
    }

    #[test]
    fn api_url_joins_prefix() {
        let transport = transport("https://api.example.com/");
        assert_eq!(
            transport.api_url("devs"),
            "https://api.example.com/api/v2/devs"
        );
        assert_eq!(
            transport.api_url("/devs/abc/mgr/nodes"),
            "https://api.example.com/api/v2/devs/abc/mgr/nodes"
        );
    }

    #[test]
    fn http_config_default_values() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.min_token_lifetime(), Duration::from_secs(60));
        assert!(config.serial_id().is_none());
        assert!(config.referer().is_none());
    }

    #[test]
    fn http_config_with_options() {
        let config = HttpConfig::new()
            .with_timeout(Duration::from_secs(30))
            .with_min_token_lifetime(Duration::from_secs(5))
            .with_serial_id(14)
            .with_referer("https://i2control.haverland.com/");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.min_token_lifetime(), Duration::from_secs(5));
        assert_eq!(config.serial_id(), Some(14));
        assert_eq!(config.referer(), Some("https://i2control.haverland.com/"));
    }

    #[test]
    fn apply_headers_sets_vendor_headers() {
        let config = HttpConfig::new().with_serial_id(7).with_referer("ref");
        let client = Client::new();
        let request = config
            .apply_headers(client.get("http://localhost/"))
            .build()
            .unwrap();
        assert_eq!(request.headers()["x-serialid"], "7");
        assert_eq!(request.headers()["x-referer"], "ref");
    }

    #[test]
    fn decode_reports_malformed_response() {
        let err = decode::<Vec<String>>("devs", serde_json::json!({"devs": 1})).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Parse(ParseError::MalformedResponse(msg)) if msg.starts_with("devs:")
        ));
    }
}
