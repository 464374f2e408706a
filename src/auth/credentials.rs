// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Account credentials.

use std::fmt;

use crate::reseller::Reseller;

/// Credentials used to obtain access tokens.
///
/// The `Debug` output never contains the password or the basic auth secret.
///
/// # Examples
///
/// ```
/// use smartbox_lib::Reseller;
/// use smartbox_lib::auth::Credentials;
///
/// let reseller = Reseller::lookup("api-helki", None).unwrap();
/// let credentials = Credentials::for_reseller(&reseller, "user@example.com", "hunter2");
///
/// assert_eq!(credentials.api_base(), "https://api-helki.helki.com");
/// assert!(!format!("{credentials:?}").contains("hunter2"));
/// ```
#[derive(Clone)]
pub struct Credentials {
    api_base: String,
    basic_auth: String,
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials for an explicit API base URL.
    ///
    /// A trailing slash on `api_base` is ignored.
    #[must_use]
    pub fn new(
        api_base: impl Into<String>,
        basic_auth: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let api_base: String = api_base.into();
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            basic_auth: basic_auth.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates credentials for a reseller deployment.
    #[must_use]
    pub fn for_reseller(
        reseller: &Reseller,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(reseller.api_base(), reseller.basic_auth(), username, password)
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub(crate) fn basic_auth(&self) -> &str {
        &self.basic_auth
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_base", &self.api_base)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("basic_auth", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let credentials = Credentials::new("http://localhost:8080/", "secret", "u", "p");
        assert_eq!(credentials.api_base(), "http://localhost:8080");
    }

    #[test]
    fn debug_redacts_secrets() {
        let credentials = Credentials::new("http://localhost", "c2VjcmV0", "alice", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("c2VjcmV0"));
    }
}
