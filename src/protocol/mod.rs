// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport for the smartbox REST API.
//!
//! - [`HttpConfig`]: timeouts, token refresh threshold and vendor headers
//! - [`ApiTransport`]: authenticated JSON requests with error classification
//!
//! The realtime push connection lives in [`crate::realtime`].

mod http;

pub(crate) use http::decode;
pub use http::{ApiTransport, HttpConfig};
