// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed request bodies for writing device and node settings.
//!
//! | Body | Endpoint | Notes |
//! |------|----------|-------|
//! | [`AwayStatusUpdate`] | `devs/{dev}/mgr/away_status` | unset fields are omitted |
//! | [`NodeStatusUpdate`] | `devs/{dev}/{type}/{addr}/status` | target temperature needs units |
//! | [`NodeSetupUpdate`] | `devs/{dev}/{type}/{addr}/setup` | merged onto the current setup |
//!
//! # Examples
//!
//! ```
//! use smartbox_lib::command::NodeStatusUpdate;
//!
//! let update = NodeStatusUpdate::new().with_mode("auto");
//! assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"mode":"auto"}"#);
//! ```

mod update;

pub use update::{AwayStatusUpdate, NodeSetupUpdate, NodeStatusUpdate};
