// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Realtime device events over Socket.IO.
//!
//! Devices push their state over a Socket.IO (Engine.IO v4) WebSocket:
//! a full snapshot right after connecting, then one update per changed field.
//!
//! - [`RealtimeConnection`] - one connection: handshake, heartbeats, event decoding
//! - [`UpdateManager`] - keeps a connection alive and feeds an
//!   [`UpdateDispatcher`](crate::subscription::UpdateDispatcher)
//! - [`ReconnectionPolicy`] - backoff between reconnection attempts
//! - [`packet`] - the Engine.IO / Socket.IO text codec

mod config;
mod connection;
mod manager;
pub mod packet;
mod reconnect;

pub use config::RealtimeConfig;
pub use connection::{ConnectionState, RealtimeConnection};
pub use manager::UpdateManager;
pub use reconnect::ReconnectionPolicy;
