// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Socket.IO push connection for one device.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::auth::AuthTokenManager;
use crate::error::{Error, ProtocolError, Result};
use crate::event::{Event, EventSink, Update};
use crate::realtime::RealtimeConfig;
use crate::realtime::packet::{EnginePacket, OpenInfo, SocketPacket, SocketPacketKind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsError = tokio_tungstenite::tungstenite::Error;

/// Lifecycle of a [`RealtimeConnection`].
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Disconnected (connection lost)
///                                         -> Closed       (explicit close)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected; [`RealtimeConnection::connect`] may be called.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Handshake complete, events can be received.
    Connected,
    /// Closed on request; the connection cannot be reused.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        })
    }
}

/// An established socket waiting to be run.
struct Established {
    stream: WsStream,
    device_id: String,
    open: OpenInfo,
}

/// Persistent push connection delivering device events.
///
/// [`connect`](Self::connect) authenticates and performs the Engine.IO and
/// Socket.IO handshakes, then requests the device snapshot.
/// [`run`](Self::run) processes frames in arrival order until the connection
/// drops or is cancelled, handing every snapshot and update to an
/// [`EventSink`].
///
/// Reconnection is not handled here; see
/// [`UpdateManager`](super::UpdateManager).
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use smartbox_lib::Session;
/// use smartbox_lib::realtime::{RealtimeConfig, RealtimeConnection};
/// use smartbox_lib::subscription::UpdateDispatcher;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> smartbox_lib::Result<()> {
/// let session = Session::builder("user@example.com", "password")
///     .api_name("api-helki")
///     .build()?;
///
/// let connection = RealtimeConnection::new(Arc::clone(session.auth()), RealtimeConfig::new());
/// let dispatcher = UpdateDispatcher::new();
/// dispatcher.subscribe_to_snapshot(".away_status", |status| println!("{status}"))?;
///
/// connection.connect("device-id").await?;
/// connection.run(&dispatcher, CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
pub struct RealtimeConnection {
    auth: Arc<AuthTokenManager>,
    config: RealtimeConfig,
    state: watch::Sender<ConnectionState>,
    socket: Mutex<Option<Established>>,
    closed: CancellationToken,
}

impl RealtimeConnection {
    /// Creates a disconnected connection.
    #[must_use]
    pub fn new(auth: Arc<AuthTokenManager>, config: RealtimeConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            auth,
            config,
            state,
            socket: Mutex::new(None),
            closed: CancellationToken::new(),
        }
    }

    /// Returns the connection settings.
    #[must_use]
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Returns a receiver notified on every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Returns `true` once [`close`](Self::close) was called or a run was
    /// cancelled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Connects to the realtime endpoint of `device_id`.
    ///
    /// A valid token is obtained first, refreshing it if it is close to
    /// expiry. Calling `connect` on a connected instance does nothing.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::AuthenticationFailed`] if the token is rejected
    /// - [`ProtocolError::Handshake`] if the server refuses the namespace
    /// - [`ProtocolError::Timeout`] if the handshake takes too long
    /// - [`ProtocolError::ConnectionClosed`] if the connection was closed
    pub async fn connect(&self, device_id: &str) -> Result<()> {
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed("connection was closed".to_string()).into());
        }

        let mut socket = self.socket.lock().await;
        if socket.is_some() {
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        let timeout = self.config.handshake_timeout();

        let result = tokio::select! {
            result = tokio::time::timeout(timeout, self.handshake(device_id)) => {
                result.unwrap_or_else(|_| Err(ProtocolError::Timeout(millis(timeout)).into()))
            }
            () = self.closed.cancelled() => {
                Err(ProtocolError::ConnectionClosed("closed during handshake".to_string()).into())
            }
        };

        match result {
            Ok(established) => {
                tracing::info!(
                    device_id,
                    sid = %established.open.sid,
                    "Realtime connection established"
                );
                *socket = Some(established);
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(device_id, error = %err, "Realtime connection failed");
                self.set_state(self.idle_state());
                Err(err)
            }
        }
    }

    /// Processes frames until the connection drops or is cancelled.
    ///
    /// Snapshots (`dev_data`) and updates (`update`) are handed to `sink` in
    /// arrival order. Engine.IO pings are answered, and an application
    /// keep-alive is sent every
    /// [`keepalive_interval`](RealtimeConfig::keepalive_interval).
    ///
    /// Returns `Ok(())` when `cancel` fires or [`close`](Self::close) is
    /// called; the connection is then [`Closed`](ConnectionState::Closed).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ConnectionClosed`] if the connection is lost or
    /// was never connected, and [`ProtocolError::Timeout`] if the server stops
    /// sending heartbeats. The state is then
    /// [`Disconnected`](ConnectionState::Disconnected).
    pub async fn run<S>(&self, sink: &S, cancel: CancellationToken) -> Result<()>
    where
        S: EventSink + ?Sized,
    {
        let Some(mut established) = self.socket.lock().await.take() else {
            return Err(ProtocolError::ConnectionClosed("not connected".to_string()).into());
        };

        let namespace = self.config.namespace().to_string();
        let period = self.config.keepalive_interval();
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let idle_timeout = established.open.idle_timeout();
        let mut deadline = Instant::now() + idle_timeout;

        let result: Result<()> = loop {
            tokio::select! {
                () = cancel.cancelled() => break Ok(()),
                () = self.closed.cancelled() => break Ok(()),
                () = tokio::time::sleep_until(deadline) => {
                    break Err(ProtocolError::Timeout(millis(idle_timeout)).into());
                }
                _ = keepalive.tick() => {
                    let ping = SocketPacket::event(&namespace, "message", [Value::from("ping")]);
                    if let Err(err) = send(&mut established.stream, &EnginePacket::Message(ping)).await {
                        break Err(err);
                    }
                    tracing::trace!(device_id = %established.device_id, "Sent keep-alive");
                }
                frame = established.stream.next() => {
                    deadline = Instant::now() + idle_timeout;
                    if let Err(err) = self.handle_frame(&mut established.stream, frame, &namespace, sink).await {
                        break Err(err);
                    }
                }
            }
        };

        match result {
            Ok(()) => {
                self.closed.cancel();
                shutdown(&mut established.stream, &namespace).await;
                self.set_state(ConnectionState::Closed);
                tracing::info!(device_id = %established.device_id, "Realtime connection closed");
                Ok(())
            }
            Err(err) => {
                self.set_state(self.idle_state());
                tracing::error!(
                    device_id = %established.device_id,
                    error = %err,
                    "Realtime connection lost"
                );
                Err(err)
            }
        }
    }

    /// Closes the connection.
    ///
    /// A running [`run`](Self::run) returns `Ok(())`, and later calls to
    /// [`connect`](Self::connect) fail.
    pub async fn close(&self) {
        self.closed.cancel();
        if let Some(mut established) = self.socket.lock().await.take() {
            shutdown(&mut established.stream, self.config.namespace()).await;
        }
        self.set_state(ConnectionState::Closed);
    }

    async fn handshake(&self, device_id: &str) -> Result<Established> {
        let token = self.auth.ensure_valid_token().await?;
        let url = self.config.socket_url(
            self.auth.credentials().api_base(),
            token.access_token(),
            device_id,
        )?;

        tracing::debug!(device_id, "Opening realtime connection");

        let mut stream = match connect_async(url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(WsError::Http(response)) if response.status().as_u16() == 401 => {
                self.auth.invalidate().await;
                return Err(ProtocolError::AuthenticationFailed.into());
            }
            Err(err) => return Err(ProtocolError::from(Box::new(err)).into()),
        };

        let open = match receive(&mut stream).await? {
            EnginePacket::Open(info) => info,
            other => {
                return Err(ProtocolError::Handshake(format!(
                    "expected open packet, received {other:?}"
                ))
                .into());
            }
        };

        let namespace = self.config.namespace();
        send(
            &mut stream,
            &EnginePacket::Message(SocketPacket::connect(namespace)),
        )
        .await?;

        loop {
            match receive(&mut stream).await? {
                EnginePacket::Ping(data) => send(&mut stream, &EnginePacket::Pong(data)).await?,
                EnginePacket::Message(packet) if packet.namespace == namespace => {
                    match packet.kind {
                        SocketPacketKind::Connect => break,
                        SocketPacketKind::ConnectError => {
                            return Err(ProtocolError::Handshake(format!(
                                "namespace {namespace} refused: {}",
                                packet.data.unwrap_or(Value::Null)
                            ))
                            .into());
                        }
                        _ => tracing::trace!(kind = ?packet.kind, "Ignoring packet before namespace connect"),
                    }
                }
                EnginePacket::Close => {
                    return Err(ProtocolError::ConnectionClosed(
                        "session closed during handshake".to_string(),
                    )
                    .into());
                }
                other => tracing::trace!(packet = ?other, "Ignoring packet during handshake"),
            }
        }

        send(
            &mut stream,
            &EnginePacket::Message(SocketPacket::event(namespace, "dev_data", [])),
        )
        .await?;

        Ok(Established {
            stream,
            device_id: device_id.to_string(),
            open,
        })
    }

    async fn handle_frame<S>(
        &self,
        stream: &mut WsStream,
        frame: Option<std::result::Result<Message, WsError>>,
        namespace: &str,
        sink: &S,
    ) -> Result<()>
    where
        S: EventSink + ?Sized,
    {
        let text = match frame {
            None => {
                return Err(ProtocolError::ConnectionClosed("stream ended".to_string()).into());
            }
            Some(Err(err)) => return Err(ProtocolError::from(Box::new(err)).into()),
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => return Err(closed_by_peer(frame.as_ref())),
            Some(Ok(_)) => return Ok(()),
        };

        let packet = match EnginePacket::decode(text.as_str()) {
            Ok(packet) => packet,
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring invalid realtime frame");
                return Ok(());
            }
        };

        match packet {
            EnginePacket::Ping(data) => send(stream, &EnginePacket::Pong(data)).await,
            EnginePacket::Close => Err(ProtocolError::ConnectionClosed(
                "server closed the session".to_string(),
            )
            .into()),
            EnginePacket::Message(packet) if packet.namespace == namespace => {
                dispatch_packet(&packet, sink)
            }
            EnginePacket::Message(packet) => {
                tracing::debug!(namespace = %packet.namespace, "Ignoring packet for another namespace");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Realtime connection state changed");
        }
    }

    fn idle_state(&self) -> ConnectionState {
        if self.is_closed() {
            ConnectionState::Closed
        } else {
            ConnectionState::Disconnected
        }
    }
}

impl fmt::Debug for RealtimeConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConnection")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Turns a Socket.IO packet on the device namespace into events.
fn dispatch_packet<S>(packet: &SocketPacket, sink: &S) -> Result<()>
where
    S: EventSink + ?Sized,
{
    match packet.kind {
        SocketPacketKind::Event => {
            let body = packet.event_args().first().cloned();
            match packet.event_name() {
                Some("dev_data") => {
                    sink.handle_event(Event::Snapshot(body.unwrap_or(Value::Null)));
                }
                Some("update") => match body.map(serde_json::from_value::<Update>) {
                    Some(Ok(update)) => sink.handle_event(Event::Update(update)),
                    _ => tracing::warn!("Ignoring malformed update event"),
                },
                Some(name) => tracing::debug!(event = name, "Ignoring realtime event"),
                None => tracing::warn!("Ignoring event without a name"),
            }
            Ok(())
        }
        SocketPacketKind::Disconnect => Err(ProtocolError::ConnectionClosed(
            "server disconnected the namespace".to_string(),
        )
        .into()),
        _ => Ok(()),
    }
}

async fn send(stream: &mut WsStream, packet: &EnginePacket) -> Result<()> {
    stream
        .send(Message::text(packet.encode()))
        .await
        .map_err(|e| ProtocolError::from(Box::new(e)).into())
}

/// Reads the next Engine.IO packet, skipping non-text frames.
async fn receive(stream: &mut WsStream) -> Result<EnginePacket> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(EnginePacket::decode(text.as_str())?),
            Some(Ok(Message::Close(frame))) => return Err(closed_by_peer(frame.as_ref())),
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(ProtocolError::from(Box::new(err)).into()),
            None => {
                return Err(ProtocolError::ConnectionClosed("stream ended".to_string()).into());
            }
        }
    }
}

/// Leaves the namespace and closes the socket, ignoring transport errors.
async fn shutdown(stream: &mut WsStream, namespace: &str) {
    let leave = EnginePacket::Message(SocketPacket::disconnect(namespace));
    if let Err(err) = send(stream, &leave).await {
        tracing::debug!(error = %err, "Could not leave namespace");
    }
    if let Err(err) = stream.close(None).await {
        tracing::debug!(error = %err, "Could not close WebSocket");
    }
}

fn closed_by_peer(frame: Option<&CloseFrame>) -> Error {
    let reason = frame.map_or_else(
        || "closed by peer".to_string(),
        |f| format!("closed by peer ({}): {}", f.code, f.reason.as_str()),
    );
    ProtocolError::ConnectionClosed(reason).into()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;

    use super::*;
    use crate::auth::Credentials;
    use crate::protocol::HttpConfig;

    #[derive(Default)]
    struct Recorder(SyncMutex<Vec<Event>>);

    impl EventSink for Recorder {
        fn handle_event(&self, event: Event) {
            self.0.lock().push(event);
        }
    }

    fn connection() -> RealtimeConnection {
        let config = HttpConfig::new();
        let credentials = Credentials::new("http://127.0.0.1:9", "secret", "user", "pass");
        let auth = AuthTokenManager::new(credentials, &config, config.build_client().unwrap());
        RealtimeConnection::new(Arc::new(auth), RealtimeConfig::new())
    }

    #[test]
    fn dispatches_snapshots_and_updates() {
        let sink = Recorder::default();
        let ns = RealtimeConfig::DEFAULT_NAMESPACE;

        dispatch_packet(&SocketPacket::event(ns, "dev_data", [json!({"nodes": []})]), &sink).unwrap();
        dispatch_packet(
            &SocketPacket::event(ns, "update", [json!({"path": "/mgr/away_status", "body": {"away": true}})]),
            &sink,
        )
        .unwrap();
        dispatch_packet(&SocketPacket::event(ns, "update", [json!("garbage")]), &sink).unwrap();
        dispatch_packet(&SocketPacket::event(ns, "other", []), &sink).unwrap();

        assert_eq!(
            *sink.0.lock(),
            vec![
                Event::Snapshot(json!({"nodes": []})),
                Event::Update(Update::new("/mgr/away_status", json!({"away": true}))),
            ]
        );
    }

    #[test]
    fn namespace_disconnect_ends_connection() {
        let sink = Recorder::default();
        let result = dispatch_packet(&SocketPacket::disconnect("/api/v2/socket_io"), &sink);
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::ConnectionClosed(_)))
        ));
    }

    #[tokio::test]
    async fn run_without_connect_fails() {
        let connection = connection();
        let sink = Recorder::default();
        let result = connection.run(&sink, CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::ConnectionClosed(_)))
        ));
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn closed_connection_cannot_reconnect() {
        let connection = connection();
        let mut states = connection.watch_state();

        connection.close().await;

        assert!(connection.is_closed());
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Closed);
        assert!(connection.connect("dev").await.is_err());
    }

    #[tokio::test]
    async fn failed_connect_returns_to_disconnected() {
        let connection = connection();
        let err = connection.connect("dev").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }
}
