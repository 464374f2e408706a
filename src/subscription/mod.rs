// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription system for realtime device events.
//!
//! Consumers register interest in parts of the device state and receive a
//! callback whenever a matching value arrives on the realtime connection.
//!
//! # Overview
//!
//! - [`UpdateDispatcher`] - registry that evaluates subscriptions and invokes callbacks
//! - [`SubscriptionId`] - identifier returned on subscribe, used to unsubscribe
//! - [`PathPattern`] / [`PathMatch`] - path predicates for update subscriptions
//! - [`Subscribable`] - composite subscriptions for well-known device fields
//!
//! # Usage
//!
//! ```
//! use serde_json::json;
//! use smartbox_lib::subscription::UpdateDispatcher;
//!
//! # fn main() -> smartbox_lib::Result<()> {
//! let dispatcher = UpdateDispatcher::new();
//!
//! let sub_id = dispatcher.subscribe_to_snapshot(".away_status", |value| {
//!     println!("Away status: {value}");
//! })?;
//!
//! let stats = dispatcher.on_snapshot(&json!({"away_status": {"away": false}}));
//! assert_eq!(stats.delivered, 1);
//!
//! dispatcher.unsubscribe(sub_id);
//! # Ok(())
//! # }
//! ```
//!
//! A callback that panics is isolated: the failure is logged and reported in
//! [`DispatchStats::failures`], and the remaining subscriptions still run.

mod callback;
mod path;
mod subscribable;

pub use callback::{DispatchStats, SnapshotCallback, SubscriptionId, UpdateCallback, UpdateDispatcher};
pub use path::{PathMatch, PathPattern};
pub use subscribable::{CompositeSubscription, Subscribable};
