// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Authentication against the smartbox API.
//!
//! The API issues short-lived bearer tokens from `POST /client/token`. A
//! session starts with a password grant and keeps itself authenticated with
//! refresh grants; [`AuthTokenManager`] makes sure concurrent requests never
//! trigger more than one exchange at a time.

mod credentials;
mod manager;
mod token;

pub use credentials::Credentials;
pub use manager::AuthTokenManager;
pub use token::Token;
