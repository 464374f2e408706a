// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine.IO v4 and Socket.IO v5 text packet codec.
//!
//! Every WebSocket text frame carries one Engine.IO packet: a type digit
//! followed by an optional payload. Engine.IO `message` packets (`4`) carry a
//! Socket.IO packet: a type digit, an optional namespace terminated by a
//! comma, an optional acknowledgement id and an optional JSON payload.
//!
//! ```text
//! 0{"sid":"abc","pingInterval":25000,"pingTimeout":20000}   open
//! 2                                                         ping
//! 40/api/v2/socket_io,                                      connect namespace
//! 42/api/v2/socket_io,["update",{"path":"/mgr/away_status","body":{}}]
//! ```

use std::fmt::Write as _;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;

/// Handshake data sent by the server in the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    /// Engine.IO session id.
    pub sid: String,
    /// Interval between server pings, in milliseconds.
    #[serde(default = "OpenInfo::default_ping_interval")]
    pub ping_interval: u64,
    /// Time the server waits for a pong, in milliseconds.
    #[serde(default = "OpenInfo::default_ping_timeout")]
    pub ping_timeout: u64,
    /// Transports the session may upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,
}

impl OpenInfo {
    fn default_ping_interval() -> u64 {
        25_000
    }

    fn default_ping_timeout() -> u64 {
        20_000
    }

    /// Returns how long the connection may stay silent before it is
    /// considered dead.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// An Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// Session opened (`0`).
    Open(OpenInfo),
    /// Session closed (`1`).
    Close,
    /// Heartbeat request (`2`), with optional probe data.
    Ping(String),
    /// Heartbeat response (`3`).
    Pong(String),
    /// Socket.IO payload (`4`).
    Message(SocketPacket),
    /// Transport upgrade (`5`).
    Upgrade,
    /// No-op (`6`).
    Noop,
}

impl EnginePacket {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidPacket`] if the frame is not a valid packet.
    pub fn decode(frame: &str) -> Result<Self, ParseError> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ParseError::InvalidPacket("empty frame".to_string()))?;
        let payload = chars.as_str();

        match kind {
            '0' => serde_json::from_str(payload)
                .map(Self::Open)
                .map_err(|e| ParseError::InvalidPacket(format!("invalid open packet: {e}"))),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(payload.to_string())),
            '3' => Ok(Self::Pong(payload.to_string())),
            '4' => SocketPacket::decode(payload).map(Self::Message),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(ParseError::InvalidPacket(format!(
                "unknown engine packet type {other:?}"
            ))),
        }
    }

    /// Encodes the packet as a text frame.
    ///
    /// `Open` packets are only sent by servers and encode to their type digit.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Open(_) => "0".to_string(),
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{data}"),
            Self::Pong(data) => format!("3{data}"),
            Self::Message(packet) => format!("4{}", packet.encode()),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPacketKind {
    /// Namespace connect request or acknowledgement.
    Connect,
    /// Namespace disconnect.
    Disconnect,
    /// Event.
    Event,
    /// Event acknowledgement.
    Ack,
    /// Namespace connection refused.
    ConnectError,
    /// Event with binary attachments.
    BinaryEvent,
    /// Acknowledgement with binary attachments.
    BinaryAck,
}

impl SocketPacketKind {
    const fn digit(self) -> char {
        match self {
            Self::Connect => '0',
            Self::Disconnect => '1',
            Self::Event => '2',
            Self::Ack => '3',
            Self::ConnectError => '4',
            Self::BinaryEvent => '5',
            Self::BinaryAck => '6',
        }
    }

    fn from_digit(digit: char) -> Option<Self> {
        Some(match digit {
            '0' => Self::Connect,
            '1' => Self::Disconnect,
            '2' => Self::Event,
            '3' => Self::Ack,
            '4' => Self::ConnectError,
            '5' => Self::BinaryEvent,
            '6' => Self::BinaryAck,
            _ => return None,
        })
    }
}

/// A Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    /// Packet type.
    pub kind: SocketPacketKind,
    /// Namespace, `/` for the default namespace.
    pub namespace: String,
    /// Acknowledgement id.
    pub id: Option<u64>,
    /// JSON payload.
    pub data: Option<Value>,
}

impl SocketPacket {
    /// Creates a namespace connect request.
    #[must_use]
    pub fn connect(namespace: &str) -> Self {
        Self {
            kind: SocketPacketKind::Connect,
            namespace: namespace.to_string(),
            id: None,
            data: None,
        }
    }

    /// Creates a namespace disconnect.
    #[must_use]
    pub fn disconnect(namespace: &str) -> Self {
        Self {
            kind: SocketPacketKind::Disconnect,
            ..Self::connect(namespace)
        }
    }

    /// Creates an event with the given arguments.
    #[must_use]
    pub fn event(namespace: &str, name: &str, args: impl IntoIterator<Item = Value>) -> Self {
        let data = std::iter::once(Value::String(name.to_string()))
            .chain(args)
            .collect();
        Self {
            kind: SocketPacketKind::Event,
            namespace: namespace.to_string(),
            id: None,
            data: Some(Value::Array(data)),
        }
    }

    /// Returns the event name for event packets.
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        if self.kind != SocketPacketKind::Event {
            return None;
        }
        self.data.as_ref()?.as_array()?.first()?.as_str()
    }

    /// Returns the event arguments for event packets.
    #[must_use]
    pub fn event_args(&self) -> &[Value] {
        match (&self.kind, self.data.as_ref().and_then(Value::as_array)) {
            (SocketPacketKind::Event, Some(items)) if !items.is_empty() => &items[1..],
            _ => &[],
        }
    }

    /// Decodes a Socket.IO packet (without the Engine.IO `4` prefix).
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidPacket`] if the packet is malformed.
    pub fn decode(input: &str) -> Result<Self, ParseError> {
        let mut chars = input.chars();
        let kind = chars
            .next()
            .and_then(SocketPacketKind::from_digit)
            .ok_or_else(|| ParseError::InvalidPacket(format!("invalid socket packet {input:?}")))?;
        let mut rest = chars.as_str();

        if matches!(
            kind,
            SocketPacketKind::BinaryEvent | SocketPacketKind::BinaryAck
        ) {
            return Err(ParseError::InvalidPacket(
                "binary packets are not supported".to_string(),
            ));
        }

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let namespace = &rest[..end];
            rest = rest.get(end + 1..).unwrap_or("");
            namespace.to_string()
        } else {
            "/".to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let id = if digits > 0 {
            let id = rest[..digits]
                .parse()
                .map_err(|e| ParseError::InvalidPacket(format!("invalid ack id: {e}")))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(rest)
                    .map_err(|e| ParseError::InvalidPacket(format!("invalid payload: {e}")))?,
            )
        };

        Ok(Self {
            kind,
            namespace,
            id,
            data,
        })
    }

    /// Encodes the packet (without the Engine.IO `4` prefix).
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());
        if self.namespace != "/" {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.id {
            let _ = write!(out, "{id}");
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }
}
