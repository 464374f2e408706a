// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Realtime connection settings.

use std::time::Duration;

use crate::error::ProtocolError;

/// Settings for a [`RealtimeConnection`](super::RealtimeConnection).
///
/// # Examples
///
/// ```
/// use smartbox_lib::realtime::RealtimeConfig;
/// use std::time::Duration;
///
/// let config = RealtimeConfig::new()
///     .with_keepalive_interval(Duration::from_secs(30))
///     .with_endpoint("ws://127.0.0.1:9000");
///
/// let url = config
///     .socket_url("https://api-helki.helki.com", "token", "dev1")
///     .unwrap();
/// assert_eq!(
///     url,
///     "ws://127.0.0.1:9000/api/v2/socket_io/?token=token&dev_id=dev1&EIO=4&transport=websocket"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    endpoint: Option<String>,
    path: String,
    namespace: String,
    keepalive_interval: Duration,
    handshake_timeout: Duration,
}

impl RealtimeConfig {
    /// Default Engine.IO path and Socket.IO namespace.
    pub const DEFAULT_NAMESPACE: &'static str = "/api/v2/socket_io";
    /// Default interval between application keep-alive messages.
    pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);
    /// Default time allowed for the connect handshake.
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoint: None,
            path: Self::DEFAULT_NAMESPACE.to_string(),
            namespace: Self::DEFAULT_NAMESPACE.to_string(),
            keepalive_interval: Self::DEFAULT_KEEPALIVE_INTERVAL,
            handshake_timeout: Self::DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Connects to `endpoint` instead of the API host.
    ///
    /// Accepts `ws://`, `wss://`, `http://` or `https://` URLs.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the Engine.IO path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the Socket.IO namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the interval between application keep-alive messages.
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Sets the time allowed for the connect handshake.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Returns the endpoint override.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns the Engine.IO path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the Socket.IO namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }

    /// Returns the handshake timeout.
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Builds the WebSocket URL for a device.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidAddress`] if the base URL has an
    /// unsupported scheme.
    pub fn socket_url(
        &self,
        api_base: &str,
        access_token: &str,
        device_id: &str,
    ) -> Result<String, ProtocolError> {
        let base = self.endpoint.as_deref().unwrap_or(api_base);
        let base = base.trim_end_matches('/');

        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.to_string()
        } else {
            return Err(ProtocolError::InvalidAddress(format!(
                "unsupported realtime endpoint {base:?}"
            )));
        };

        Ok(format!(
            "{ws_base}/{}/?token={}&dev_id={}&EIO=4&transport=websocket",
            self.path.trim_matches('/'),
            urlencoding::encode(access_token),
            urlencoding::encode(device_id),
        ))
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
