// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Known vendor deployments of the smartbox API.
//!
//! Every reseller runs the same API under its own host name
//! (`https://<api_name>.helki.com`) and identifies its client with a basic
//! auth secret and an optional serial id.

use crate::error::ValueError;

/// Basic auth secret shared by most resellers.
pub const GENERIC_BASIC_AUTH: &str = "NTRiY2NiZmI0MWE5YTUxMTNmMDQ4OGQwOnZkaXZkaQ==";

/// Host suffix shared by all reseller APIs.
const API_HOST_SUFFIX: &str = "helki.com";

struct KnownReseller {
    api_name: &'static str,
    name: &'static str,
    web_url: &'static str,
    basic_auth: &'static str,
    serial_id: Option<u32>,
}

const KNOWN_RESELLERS: &[KnownReseller] = &[
    KnownReseller {
        api_name: "api",
        name: "Smartbox",
        web_url: "",
        basic_auth: GENERIC_BASIC_AUTH,
        serial_id: None,
    },
    KnownReseller {
        api_name: "api-helki",
        name: "Helki",
        web_url: "https://app.helki.com/",
        basic_auth: GENERIC_BASIC_AUTH,
        serial_id: Some(1),
    },
    KnownReseller {
        api_name: "api-climastar",
        name: "Climastar",
        web_url: "https://avantwifi.climastar.es/",
        basic_auth: GENERIC_BASIC_AUTH,
        serial_id: Some(5),
    },
    KnownReseller {
        api_name: "api-elnur",
        name: "Elnur",
        web_url: "https://remotecontrol.elnur.es/",
        basic_auth: GENERIC_BASIC_AUTH,
        serial_id: Some(7),
    },
    KnownReseller {
        api_name: "api-hjm",
        name: "HJM",
        web_url: "https://api.calorhjm.com/",
        basic_auth: GENERIC_BASIC_AUTH,
        serial_id: Some(10),
    },
    KnownReseller {
        api_name: "api-haverland",
        name: "Haverland",
        web_url: "https://i2control.haverland.com/",
        basic_auth: "NTU2ZDc0MWI3OGUzYmU5YjU2NjA3NTQ4OnZkaXZkaQ==",
        serial_id: Some(14),
    },
    KnownReseller {
        api_name: "api-lhz",
        name: "Technotherm",
        web_url: "https://ttiapp.technotherm.com/",
        basic_auth: GENERIC_BASIC_AUTH,
        serial_id: Some(16),
    },
];

/// Client settings for one vendor deployment.
///
/// # Examples
///
/// ```
/// use smartbox_lib::Reseller;
///
/// let reseller = Reseller::lookup("api-elnur", None).unwrap();
/// assert_eq!(reseller.name(), "Elnur");
/// assert_eq!(reseller.serial_id(), Some(7));
/// assert_eq!(reseller.api_base(), "https://api-elnur.helki.com");
///
/// // Unknown deployments need their own secret
/// assert!(Reseller::lookup("api-acme", None).is_err());
/// assert!(Reseller::lookup("api-acme", Some("c2VjcmV0")).is_ok());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Reseller {
    api_name: String,
    name: String,
    web_url: Option<String>,
    basic_auth: String,
    serial_id: Option<u32>,
}

impl Reseller {
    /// Default display name for deployments not in the known table.
    pub const DEFAULT_NAME: &'static str = "Smartbox";

    /// Returns the known reseller with this API name.
    #[must_use]
    pub fn known(api_name: &str) -> Option<Self> {
        KNOWN_RESELLERS
            .iter()
            .find(|r| r.api_name == api_name)
            .map(Self::from_known)
    }

    /// Returns every known reseller.
    #[must_use]
    pub fn all() -> Vec<Self> {
        KNOWN_RESELLERS.iter().map(Self::from_known).collect()
    }

    /// Resolves an API name.
    ///
    /// Known resellers keep their own secret; `basic_auth` is only used for
    /// deployments that are not in the table.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::UnknownReseller`] if the API name is unknown and
    /// no secret is supplied.
    pub fn lookup(api_name: &str, basic_auth: Option<&str>) -> Result<Self, ValueError> {
        if let Some(known) = Self::known(api_name) {
            return Ok(known);
        }
        match basic_auth {
            Some(secret) => Ok(Self::custom(api_name, secret)),
            None => Err(ValueError::UnknownReseller(api_name.to_string())),
        }
    }

    /// Creates a reseller entry for an unlisted deployment.
    #[must_use]
    pub fn custom(api_name: impl Into<String>, basic_auth: impl Into<String>) -> Self {
        Self {
            api_name: api_name.into(),
            name: Self::DEFAULT_NAME.to_string(),
            web_url: None,
            basic_auth: basic_auth.into(),
            serial_id: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the serial id sent in the `x-serialid` header.
    #[must_use]
    pub fn with_serial_id(mut self, serial_id: u32) -> Self {
        self.serial_id = Some(serial_id);
        self
    }

    /// Sets the vendor web application URL.
    #[must_use]
    pub fn with_web_url(mut self, web_url: impl Into<String>) -> Self {
        self.web_url = Some(web_url.into());
        self
    }

    /// Returns the API name (host prefix).
    #[must_use]
    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the vendor web application URL, if any.
    #[must_use]
    pub fn web_url(&self) -> Option<&str> {
        self.web_url.as_deref()
    }

    /// Returns the basic auth secret used for token requests.
    #[must_use]
    pub fn basic_auth(&self) -> &str {
        &self.basic_auth
    }

    /// Returns the serial id, if the reseller has one.
    #[must_use]
    pub fn serial_id(&self) -> Option<u32> {
        self.serial_id
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn api_base(&self) -> String {
        format!("https://{}.{API_HOST_SUFFIX}", self.api_name)
    }

    fn from_known(known: &KnownReseller) -> Self {
        Self {
            api_name: known.api_name.to_string(),
            name: known.name.to_string(),
            web_url: (!known.web_url.is_empty()).then(|| known.web_url.to_string()),
            basic_auth: known.basic_auth.to_string(),
            serial_id: known.serial_id,
        }
    }
}

impl std::fmt::Debug for Reseller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reseller")
            .field("api_name", &self.api_name)
            .field("name", &self.name)
            .field("web_url", &self.web_url)
            .field("serial_id", &self.serial_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_resellers() {
        let all = Reseller::all();
        assert_eq!(all.len(), 7);

        let haverland = Reseller::known("api-haverland").unwrap();
        assert_eq!(haverland.name(), "Haverland");
        assert_eq!(haverland.serial_id(), Some(14));
        assert_ne!(haverland.basic_auth(), GENERIC_BASIC_AUTH);

        let generic = Reseller::known("api").unwrap();
        assert_eq!(generic.serial_id(), None);
        assert_eq!(generic.web_url(), None);
        assert_eq!(generic.basic_auth(), GENERIC_BASIC_AUTH);
    }

    #[test]
    fn lookup_prefers_known_secret() {
        let reseller = Reseller::lookup("api-lhz", Some("other")).unwrap();
        assert_eq!(reseller.name(), "Technotherm");
        assert_eq!(reseller.basic_auth(), GENERIC_BASIC_AUTH);
    }

    #[test]
    fn unknown_reseller_requires_secret() {
        assert_eq!(
            Reseller::lookup("api-acme", None),
            Err(ValueError::UnknownReseller("api-acme".to_string()))
        );

        let custom = Reseller::lookup("api-acme", Some("c2VjcmV0"))
            .unwrap()
            .with_name("Acme")
            .with_serial_id(99);
        assert_eq!(custom.name(), "Acme");
        assert_eq!(custom.serial_id(), Some(99));
        assert_eq!(custom.api_base(), "https://api-acme.helki.com");
    }

    #[test]
    fn debug_hides_secret() {
        let debug = format!("{:?}", Reseller::known("api-helki").unwrap());
        assert!(!debug.contains(GENERIC_BASIC_AUTH));
    }
}
