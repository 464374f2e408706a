// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Long-running realtime updates for one device.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthTokenManager;
use crate::error::Result;
use crate::realtime::{ConnectionState, RealtimeConfig, RealtimeConnection, ReconnectionPolicy};
use crate::subscription::{
    CompositeSubscription, PathMatch, Subscribable, SubscriptionId, UpdateDispatcher,
};

/// Keeps a device's realtime connection alive and feeds its events to an
/// [`UpdateDispatcher`].
///
/// [`run`](Self::run) connects, processes events until the connection drops,
/// and reconnects according to the [`ReconnectionPolicy`]. The retry counter
/// resets after every successful connection. Authentication failures are not
/// retried.
///
/// # Examples
///
/// ```no_run
/// use smartbox_lib::Session;
/// use smartbox_lib::realtime::{RealtimeConfig, ReconnectionPolicy};
/// use smartbox_lib::subscription::Subscribable;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> smartbox_lib::Result<()> {
/// let session = Session::builder("user@example.com", "password")
///     .api_name("api-elnur")
///     .build()?;
///
/// let manager = session
///     .update_manager("device-id", RealtimeConfig::new())
///     .with_reconnection(ReconnectionPolicy::new().with_max_retries(5));
///
/// manager.on_node_status(|node_type, addr, status| {
///     println!("{node_type}/{addr}: {status}");
/// })?;
///
/// let cancel = CancellationToken::new();
/// manager.run(cancel.child_token()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct UpdateManager {
    connection: RealtimeConnection,
    dispatcher: Arc<UpdateDispatcher>,
    device_id: String,
    policy: ReconnectionPolicy,
}

impl UpdateManager {
    /// Creates a manager with its own dispatcher and the default policy.
    #[must_use]
    pub fn new(
        auth: Arc<AuthTokenManager>,
        device_id: impl Into<String>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            connection: RealtimeConnection::new(auth, config),
            dispatcher: Arc::new(UpdateDispatcher::new()),
            device_id: device_id.into(),
            policy: ReconnectionPolicy::default(),
        }
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub fn with_reconnection(mut self, policy: ReconnectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses a shared dispatcher instead of a private one.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<UpdateDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Returns the dispatcher receiving this device's events.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<UpdateDispatcher> {
        &self.dispatcher
    }

    /// Returns the device id.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the reconnection policy.
    #[must_use]
    pub fn policy(&self) -> &ReconnectionPolicy {
        &self.policy
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Returns a receiver notified on every connection state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    /// Subscribes to device snapshots. See [`UpdateDispatcher::subscribe_to_snapshot`].
    ///
    /// # Errors
    ///
    /// Returns error if the expression does not compile.
    pub fn subscribe_to_snapshot<F>(&self, expression: &str, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe_to_snapshot(expression, callback)
    }

    /// Subscribes to device updates. See [`UpdateDispatcher::subscribe_to_updates`].
    ///
    /// # Errors
    ///
    /// Returns error if the pattern or the expression does not compile.
    pub fn subscribe_to_updates<F>(
        &self,
        path_pattern: &str,
        expression: &str,
        callback: F,
    ) -> Result<SubscriptionId>
    where
        F: Fn(&Value, &PathMatch) + Send + Sync + 'static,
    {
        self.dispatcher
            .subscribe_to_updates(path_pattern, expression, callback)
    }

    /// Removes a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Runs the connection until `cancel` fires, [`close`](Self::close) is
    /// called or the reconnection policy gives up.
    ///
    /// # Errors
    ///
    /// Returns the last connection error when the policy stops retrying, or
    /// immediately on an authentication failure.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() || self.connection.is_closed() {
                break;
            }

            let outcome = tokio::select! {
                () = cancel.cancelled() => break,
                result = self.connection.connect(&self.device_id) => result,
            };

            let outcome = match outcome {
                Ok(()) => {
                    attempt = 0;
                    self.connection
                        .run(self.dispatcher.as_ref(), cancel.clone())
                        .await
                }
                Err(err) => Err(err),
            };

            let err = match outcome {
                Ok(()) => break,
                Err(err) => err,
            };

            if err.is_authentication_failed() {
                tracing::error!(device_id = %self.device_id, "Realtime authentication failed, giving up");
                return Err(err);
            }
            if !self.policy.should_retry(attempt) {
                tracing::error!(
                    device_id = %self.device_id,
                    attempts = attempt,
                    error = %err,
                    "Giving up on realtime connection"
                );
                return Err(err);
            }

            let delay = self.policy.delay_for_attempt(attempt);
            attempt = attempt.saturating_add(1);
            tracing::warn!(
                device_id = %self.device_id,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Reconnecting realtime connection"
            );

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.connection.close().await;
        Ok(())
    }

    /// Closes the connection and ends [`run`](Self::run).
    pub async fn close(&self) {
        self.connection.close().await;
    }
}

impl Subscribable for UpdateManager {
    fn on_device_away_status<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.dispatcher.on_device_away_status(callback)
    }

    fn on_device_power_limit<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        self.dispatcher.on_device_power_limit(callback)
    }

    fn on_node_status<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(&str, u32, &Value) + Send + Sync + 'static,
    {
        self.dispatcher.on_node_status(callback)
    }

    fn on_node_setup<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(&str, u32, &Value) + Send + Sync + 'static,
    {
        self.dispatcher.on_node_setup(callback)
    }

    fn unsubscribe_composite(&self, subscription: CompositeSubscription) -> bool {
        self.dispatcher.unsubscribe_composite(subscription)
    }
}
