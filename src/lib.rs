// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Smartbox Lib - A Rust library to control Smartbox heating devices.
//!
//! This library provides async APIs to the Smartbox cloud used by Helki
//! and its resellers (Elnur, Haverland, HJM, ...): a REST API to read and
//! change device state, and a Socket.IO stream pushing changes as they happen.
//!
//! # Supported Features
//!
//! - **Authentication**: token exchange and refresh shared by all requests
//! - **Devices and homes**: list devices, homes and their nodes
//! - **Node control**: status (mode, target temperature), setup, samples
//! - **Device settings**: away status, power limit
//! - **Realtime updates**: snapshot and per-field updates routed to subscriptions
//!
//! # Quick Start
//!
//! ## REST API
//!
//! ```no_run
//! use smartbox_lib::Session;
//! use smartbox_lib::command::NodeStatusUpdate;
//!
//! #[tokio::main]
//! async fn main() -> smartbox_lib::Result<()> {
//!     let session = Session::builder("user@example.com", "password")
//!         .api_name("api-elnur")
//!         .build()?;
//!
//!     let devices = session.get_devices().await?;
//!     let device = &devices[0];
//!
//!     for node in session.get_nodes(&device.dev_id).await? {
//!         let update = NodeStatusUpdate::new()
//!             .with_mode("manual")
//!             .with_target_temperature(20.5, "C");
//!         session
//!             .set_node_status(&device.dev_id, &node.node_ref(), &update)
//!             .await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Realtime Updates
//!
//! ```no_run
//! use smartbox_lib::Session;
//! use smartbox_lib::realtime::RealtimeConfig;
//! use smartbox_lib::subscription::Subscribable;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> smartbox_lib::Result<()> {
//!     let session = Session::builder("user@example.com", "password")
//!         .api_name("api-elnur")
//!         .build()?;
//!
//!     let manager = session.update_manager("device-id", RealtimeConfig::new());
//!
//!     // Fires for the initial snapshot and every later update
//!     manager.on_node_status(|node_type, addr, status| {
//!         println!("{node_type}/{addr} status: {status}");
//!     })?;
//!
//!     manager.subscribe_to_updates(r"^/mgr/away_status$", ".", |body, _| {
//!         println!("away status: {body}");
//!     })?;
//!
//!     manager.run(CancellationToken::new()).await
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod auth;
pub mod command;
pub mod error;
pub mod event;
pub mod expression;
pub mod protocol;
#[cfg(feature = "realtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "realtime")))]
pub mod realtime;
mod reseller;
pub mod response;
mod session;
pub mod subscription;
pub mod types;

pub use auth::{AuthTokenManager, Credentials, Token};
pub use error::{
    CallbackError, Error, ExpressionError, ParseError, ProtocolError, Result, ValueError,
};
pub use event::{Event, EventSink, Update};
pub use expression::CompiledExpression;
pub use protocol::{ApiTransport, HttpConfig};
#[cfg(feature = "realtime")]
pub use realtime::{ConnectionState, RealtimeConnection, UpdateManager};
pub use reseller::{GENERIC_BASIC_AUTH, Reseller};
pub use session::{Session, SessionBuilder};
pub use subscription::{Subscribable, SubscriptionId, UpdateDispatcher};
pub use types::{NodeRef, NodeType};
