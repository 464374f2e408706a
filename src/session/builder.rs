// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session builder.

use std::sync::Arc;

use reqwest::Client;

use crate::auth::{AuthTokenManager, Credentials};
use crate::error::Error;
use crate::protocol::{ApiTransport, HttpConfig};
use crate::reseller::Reseller;
use crate::session::Session;

/// Builder for [`Session`].
///
/// The reseller API name selects both the API host and the client secret.
/// Unlisted deployments need an explicit secret via
/// [`basic_auth`](Self::basic_auth).
///
/// # Examples
///
/// ```no_run
/// use smartbox_lib::Session;
/// use smartbox_lib::protocol::HttpConfig;
/// use std::time::Duration;
///
/// # fn example() -> smartbox_lib::Result<()> {
/// // Known reseller
/// let session = Session::builder("user@example.com", "password")
///     .api_name("api-elnur")
///     .build()?;
///
/// // Local test server with a custom secret
/// let session = Session::builder("user@example.com", "password")
///     .api_base("http://127.0.0.1:8080")
///     .basic_auth("c2VjcmV0")
///     .http_config(HttpConfig::new().with_timeout(Duration::from_secs(5)))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionBuilder {
    username: String,
    password: String,
    api_name: String,
    basic_auth: Option<String>,
    api_base: Option<String>,
    config: HttpConfig,
    client: Option<Client>,
}

impl SessionBuilder {
    /// API name used when none is set.
    pub const DEFAULT_API_NAME: &'static str = "api";

    pub(crate) fn new(username: String, password: String) -> Self {
        Self {
            username,
            password,
            api_name: Self::DEFAULT_API_NAME.to_string(),
            basic_auth: None,
            api_base: None,
            config: HttpConfig::default(),
            client: None,
        }
    }

    /// Sets the reseller API name (for example `api-elnur`).
    #[must_use]
    pub fn api_name(mut self, api_name: impl Into<String>) -> Self {
        self.api_name = api_name.into();
        self
    }

    /// Sets the client secret sent to the token endpoint.
    ///
    /// Overrides the secret of a known reseller.
    #[must_use]
    pub fn basic_auth(mut self, basic_auth: impl Into<String>) -> Self {
        self.basic_auth = Some(basic_auth.into());
        self
    }

    /// Overrides the API base URL derived from the API name.
    #[must_use]
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Sets the HTTP configuration.
    #[must_use]
    pub fn http_config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    /// Reuses an existing HTTP client instead of building one.
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the session. No request is sent until the first API call.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The API name is unknown and no secret was given
    /// - The HTTP client cannot be created
    pub fn build(self) -> Result<Session, Error> {
        let reseller = Reseller::lookup(&self.api_name, self.basic_auth.as_deref())?;

        let basic_auth = self
            .basic_auth
            .unwrap_or_else(|| reseller.basic_auth().to_string());
        let api_base = self.api_base.unwrap_or_else(|| reseller.api_base());

        let mut config = self.config;
        if config.serial_id().is_none()
            && let Some(serial_id) = reseller.serial_id()
        {
            config = config.with_serial_id(serial_id);
        }

        let client = match self.client {
            Some(client) => client,
            None => config.build_client()?,
        };

        tracing::debug!(
            api_name = %self.api_name,
            api_base = %api_base,
            reseller = reseller.name(),
            "Building session"
        );

        let credentials = Credentials::new(api_base, basic_auth, self.username, self.password);
        let auth = Arc::new(AuthTokenManager::new(credentials, &config, client.clone()));
        Ok(Session::new(ApiTransport::new(auth, client, config)))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ValueError;
    use crate::Session;

    use super::*;

    #[test]
    fn known_reseller_defaults() {
        let session = Session::builder("user", "pass")
            .api_name("api-elnur")
            .build()
            .unwrap();

        assert_eq!(session.transport().api_base(), "https://api-elnur.helki.com");
        assert_eq!(session.transport().config().serial_id(), Some(7));
        assert_eq!(session.auth().credentials().username(), "user");
    }

    #[test]
    fn default_api_name() {
        let session = Session::builder("user", "pass").build().unwrap();
        assert_eq!(session.transport().api_base(), "https://api.helki.com");
    }

    #[test]
    fn unknown_reseller_requires_secret() {
        let err = Session::builder("user", "pass")
            .api_name("api-nowhere")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Value(ValueError::UnknownReseller(_))));

        let session = Session::builder("user", "pass")
            .api_name("api-nowhere")
            .basic_auth("c2VjcmV0")
            .build()
            .unwrap();
        assert_eq!(session.transport().api_base(), "https://api-nowhere.helki.com");
    }

    #[test]
    fn explicit_settings_win() {
        let session = Session::builder("user", "pass")
            .api_name("api-elnur")
            .api_base("http://127.0.0.1:8080/")
            .http_config(HttpConfig::new().with_serial_id(99))
            .build()
            .unwrap();

        assert_eq!(session.transport().api_base(), "http://127.0.0.1:8080");
        assert_eq!(session.transport().config().serial_id(), Some(99));
    }

    #[test]
    fn explicit_secret_replaces_reseller_secret() {
        let session = Session::builder("user", "pass")
            .api_name("api-elnur")
            .basic_auth("b3ZlcnJpZGU=")
            .build()
            .unwrap();

        assert_eq!(session.auth().credentials().basic_auth(), "b3ZlcnJpZGU=");
        assert_eq!(session.transport().config().serial_id(), Some(7));
    }
}
