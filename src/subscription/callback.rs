// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription registry and event dispatch.
//!
//! This module provides the core types for realtime subscriptions:
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`UpdateDispatcher`] - Registry that stores subscriptions and routes
//!   snapshot and update events to them

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{CallbackError, Result};
use crate::event::{Event, EventSink, Update};
use crate::expression::CompiledExpression;
use crate::subscription::{PathMatch, PathPattern};

/// Unique identifier for a subscription.
///
/// This ID is returned when creating a subscription and can be used to
/// unsubscribe later. IDs are unique within a dispatcher's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new subscription ID with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Type alias for snapshot callbacks.
pub type SnapshotCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Type alias for update callbacks (receives the extracted value and the path match).
pub type UpdateCallback = Arc<dyn Fn(&Value, &PathMatch) + Send + Sync>;

/// A subscription matched against full device snapshots.
struct SnapshotSubscription {
    expression: CompiledExpression,
    callback: SnapshotCallback,
}

/// A subscription matched against path-addressed updates.
struct DeltaSubscription {
    pattern: PathPattern,
    expression: CompiledExpression,
    callback: UpdateCallback,
}

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Number of subscriptions the event applied to.
    pub matched: usize,
    /// Number of callback invocations that completed.
    pub delivered: usize,
    /// Callback invocations that panicked.
    pub failures: Vec<CallbackError>,
}

impl DispatchStats {
    /// Returns the number of failed callback invocations.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    fn record(&mut self, outcome: std::result::Result<(), CallbackError>) {
        match outcome {
            Ok(()) => self.delivered += 1,
            Err(err) => {
                tracing::error!(
                    subscription = %err.subscription,
                    error = %err.message,
                    "Subscription callback failed"
                );
                self.failures.push(err);
            }
        }
    }
}

/// Registry of realtime subscriptions.
///
/// Snapshot subscriptions are evaluated against every full device snapshot;
/// update subscriptions are evaluated against every update whose path matches
/// their pattern. Each subscription compiles its extraction expression once,
/// at registration.
///
/// # Thread Safety
///
/// The dispatcher uses `parking_lot::RwLock` for its maps and can be shared
/// between tasks. Subscriptions are cloned out of the lock before their
/// callbacks run, so a callback may subscribe or unsubscribe freely.
///
/// # Failure Isolation
///
/// A callback that panics is reported as a [`CallbackError`] and logged; the
/// remaining subscriptions for the same event are still invoked. Failed
/// invocations are not retried.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use smartbox_lib::subscription::UpdateDispatcher;
/// use smartbox_lib::event::Update;
///
/// # fn main() -> smartbox_lib::Result<()> {
/// let dispatcher = UpdateDispatcher::new();
///
/// dispatcher.subscribe_to_snapshot(".away_status", |value| {
///     println!("away status from snapshot: {value}");
/// })?;
/// dispatcher.subscribe_to_updates("^/mgr/away_status$", ".", |value, _path| {
///     println!("away status changed: {value}");
/// })?;
///
/// dispatcher.on_snapshot(&json!({"away_status": {"away": false}}));
/// dispatcher.on_update(&Update::new("/mgr/away_status", json!({"away": true})));
/// # Ok(())
/// # }
/// ```
pub struct UpdateDispatcher {
    /// Counter for generating unique subscription IDs.
    next_id: AtomicU64,
    /// Subscriptions evaluated against snapshots.
    snapshot_subscriptions: RwLock<HashMap<SubscriptionId, Arc<SnapshotSubscription>>>,
    /// Subscriptions evaluated against updates.
    update_subscriptions: RwLock<HashMap<SubscriptionId, Arc<DeltaSubscription>>>,
}

impl UpdateDispatcher {
    /// Creates a new empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            snapshot_subscriptions: RwLock::new(HashMap::new()),
            update_subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Generates a new unique subscription ID.
    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Subscribes to full device snapshots.
    ///
    /// The callback runs once per non-null value `expression` extracts from
    /// each snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if `expression` does not compile.
    pub fn subscribe_to_snapshot<F>(&self, expression: &str, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let subscription = SnapshotSubscription {
            expression: CompiledExpression::compile(expression)?,
            callback: Arc::new(callback),
        };
        let id = self.next_id();
        tracing::debug!(subscription = %id, expression = %expression, "Subscribed to snapshots");
        self.snapshot_subscriptions
            .write()
            .insert(id, Arc::new(subscription));
        Ok(id)
    }

    /// Subscribes to updates whose path matches `path_pattern`.
    ///
    /// `expression` is evaluated against the update body; the callback runs
    /// once per non-null extracted value and also receives the path captures.
    /// A body that yields only `null` does not fire the callback.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern or the expression does not compile.
    pub fn subscribe_to_updates<F>(
        &self,
        path_pattern: &str,
        expression: &str,
        callback: F,
    ) -> Result<SubscriptionId>
    where
        F: Fn(&Value, &PathMatch) + Send + Sync + 'static,
    {
        let subscription = DeltaSubscription {
            pattern: PathPattern::new(path_pattern)?,
            expression: CompiledExpression::compile(expression)?,
            callback: Arc::new(callback),
        };
        let id = self.next_id();
        tracing::debug!(
            subscription = %id,
            pattern = %path_pattern,
            expression = %expression,
            "Subscribed to updates"
        );
        self.update_subscriptions
            .write()
            .insert(id, Arc::new(subscription));
        Ok(id)
    }

    // =========================================================================
    // Unsubscription
    // =========================================================================

    /// Removes a subscription by its ID.
    ///
    /// Returns `true` if a subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.snapshot_subscriptions.write().remove(&id).is_some()
            || self.update_subscriptions.write().remove(&id).is_some()
    }

    /// Removes all subscriptions.
    pub fn clear(&self) {
        self.snapshot_subscriptions.write().clear();
        self.update_subscriptions.write().clear();
    }

    // =========================================================================
    // Dispatch methods
    // =========================================================================

    /// Dispatches a full device snapshot to every snapshot subscription.
    pub fn on_snapshot(&self, body: &Value) -> DispatchStats {
        let subscriptions: Vec<_> = self
            .snapshot_subscriptions
            .read()
            .iter()
            .map(|(id, sub)| (*id, Arc::clone(sub)))
            .collect();

        let mut stats = DispatchStats {
            matched: subscriptions.len(),
            ..DispatchStats::default()
        };
        for (id, subscription) in subscriptions {
            for value in subscription.expression.evaluate(body) {
                stats.record(invoke(id, || (subscription.callback)(&value)));
            }
        }
        stats
    }

    /// Dispatches an update to every update subscription whose pattern matches its path.
    pub fn on_update(&self, update: &Update) -> DispatchStats {
        let subscriptions: Vec<_> = self
            .update_subscriptions
            .read()
            .iter()
            .map(|(id, sub)| (*id, Arc::clone(sub)))
            .collect();

        let mut stats = DispatchStats::default();
        for (id, subscription) in subscriptions {
            let Some(path_match) = subscription.pattern.captures(&update.path) else {
                continue;
            };
            stats.matched += 1;
            for value in subscription.expression.evaluate(&update.body) {
                stats.record(invoke(id, || (subscription.callback)(&value, &path_match)));
            }
        }

        if stats.matched == 0 {
            tracing::trace!(path = %update.path, "No subscription for update");
        }
        stats
    }

    /// Dispatches any event.
    pub fn dispatch(&self, event: &Event) -> DispatchStats {
        match event {
            Event::Snapshot(body) => self.on_snapshot(body),
            Event::Update(update) => self.on_update(update),
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns the number of snapshot subscriptions.
    #[must_use]
    pub fn snapshot_subscription_count(&self) -> usize {
        self.snapshot_subscriptions.read().len()
    }

    /// Returns the number of update subscriptions.
    #[must_use]
    pub fn update_subscription_count(&self) -> usize {
        self.update_subscriptions.read().len()
    }

    /// Returns the total number of subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.snapshot_subscription_count() + self.update_subscription_count()
    }

    /// Returns `true` if there are no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscription_count() == 0
    }
}

/// Runs one callback invocation, converting a panic into a [`CallbackError`].
fn invoke(id: SubscriptionId, f: impl FnOnce()) -> std::result::Result<(), CallbackError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| CallbackError {
        subscription: id,
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "callback panicked".to_string()
    }
}

impl EventSink for UpdateDispatcher {
    fn handle_event(&self, event: Event) {
        let stats = self.dispatch(&event);
        tracing::trace!(
            matched = stats.matched,
            delivered = stats.delivered,
            failed = stats.failed(),
            "Dispatched realtime event"
        );
    }
}

impl Default for UpdateDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UpdateDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateDispatcher")
            .field("snapshot_subscriptions", &self.snapshot_subscription_count())
            .field("update_subscriptions", &self.update_subscription_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use serde_json::json;

    use super::*;

    fn recorder() -> (Arc<parking_lot::Mutex<Vec<Value>>>, impl Fn(&Value) + Send + Sync) {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: &Value| sink.lock().push(value.clone()))
    }

    #[test]
    fn subscription_id_display() {
        let id = SubscriptionId::new(42);
        assert_eq!(id.to_string(), "Sub(42)");
        assert_eq!(id.value(), 42);
    }

    #[test]
    fn dispatcher_new_is_empty() {
        let dispatcher = UpdateDispatcher::new();
        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.subscription_count(), 0);
    }

    #[test]
    fn snapshot_subscription_receives_field() {
        let dispatcher = UpdateDispatcher::new();
        let (seen, callback) = recorder();
        dispatcher.subscribe_to_snapshot(".data", callback).unwrap();

        let stats = dispatcher.on_snapshot(&json!({"data": "value"}));

        assert_eq!(*seen.lock(), vec![json!("value")]);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn snapshot_subscription_on_unrelated_field_is_not_invoked() {
        let dispatcher = UpdateDispatcher::new();
        let (seen, callback) = recorder();
        dispatcher.subscribe_to_snapshot(".other", callback).unwrap();

        let stats = dispatcher.on_snapshot(&json!({"data": "value"}));

        assert!(seen.lock().is_empty());
        assert_eq!(stats.delivered, 0);
    }

    #[test]
    fn snapshot_subscription_runs_once_per_result() {
        let dispatcher = UpdateDispatcher::new();
        let (seen, callback) = recorder();
        dispatcher
            .subscribe_to_snapshot(".nodes[] | .addr", callback)
            .unwrap();

        dispatcher.on_snapshot(&json!({"nodes": [{"addr": 1}, {"addr": 2}, {"name": "x"}]}));

        assert_eq!(*seen.lock(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn update_subscription_matches_path() {
        let dispatcher = UpdateDispatcher::new();
        let (away, away_cb) = recorder();
        let (limit, limit_cb) = recorder();
        dispatcher
            .subscribe_to_updates("^/mgr/away_status$", ".", move |v, _| away_cb(v))
            .unwrap();
        dispatcher
            .subscribe_to_updates("^/mgr/power_limit$", ".", move |v, _| limit_cb(v))
            .unwrap();

        let stats = dispatcher.on_update(&Update::new("/mgr/away_status", json!("away")));

        assert_eq!(*away.lock(), vec![json!("away")]);
        assert!(limit.lock().is_empty());
        assert_eq!(stats.matched, 1);
    }

    #[test]
    fn update_with_null_result_is_skipped() {
        let dispatcher = UpdateDispatcher::new();
        let (seen, callback) = recorder();
        dispatcher
            .subscribe_to_updates("^/htr/2/status$", ".stemp", move |v, _| callback(v))
            .unwrap();

        let stats = dispatcher.on_update(&Update::new("/htr/2/status", json!({"stemp": null})));
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.delivered, 0);

        dispatcher.on_update(&Update::new("/htr/2/status", Value::Null));
        dispatcher.on_update(&Update::new("/htr/2/status", json!({"stemp": "20.0"})));
        assert_eq!(*seen.lock(), vec![json!("20.0")]);
    }

    #[test]
    fn update_callback_receives_captures() {
        let dispatcher = UpdateDispatcher::new();
        let captured = Arc::new(parking_lot::Mutex::new(None));
        let sink = Arc::clone(&captured);
        dispatcher
            .subscribe_to_updates(r"^/(?P<kind>[^/]+)/(\d+)/setup$", ".units", move |v, m| {
                *sink.lock() = Some((
                    m.name("kind").map(str::to_string),
                    m.get(2).map(str::to_string),
                    v.clone(),
                ));
            })
            .unwrap();

        dispatcher.on_update(&Update::new("/acm/4/setup", json!({"units": "C"})));

        assert_eq!(
            *captured.lock(),
            Some((Some("acm".to_string()), Some("4".to_string()), json!("C")))
        );
    }

    #[test]
    fn snapshot_does_not_reach_update_subscriptions() {
        let dispatcher = UpdateDispatcher::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);
        dispatcher
            .subscribe_to_updates(".*", ".", move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        dispatcher.dispatch(&Event::Snapshot(json!({"path": "/mgr/x", "body": 1})));

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn update_does_not_reach_snapshot_subscriptions() {
        let dispatcher = UpdateDispatcher::new();
        let (seen, callback) = recorder();
        dispatcher.subscribe_to_snapshot(".", callback).unwrap();

        dispatcher.dispatch(&Event::Update(Update::new("/mgr/x", json!(1))));

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn failing_callback_does_not_block_others() {
        let dispatcher = UpdateDispatcher::new();
        let failing = dispatcher
            .subscribe_to_snapshot(".data", |_| panic!("callback exploded"))
            .unwrap();
        let (seen, callback) = recorder();
        dispatcher.subscribe_to_snapshot(".data", callback).unwrap();

        let stats = dispatcher.on_snapshot(&json!({"data": 1}));

        assert_eq!(*seen.lock(), vec![json!(1)]);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.failures[0].subscription, failing);
        assert_eq!(stats.failures[0].message, "callback exploded");
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let dispatcher = UpdateDispatcher::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);
        let id = dispatcher
            .subscribe_to_snapshot(".a", move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        dispatcher.on_snapshot(&json!({"a": 1}));
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        dispatcher.on_snapshot(&json!({"a": 1}));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let dispatcher = Arc::new(UpdateDispatcher::new());
        let slot = Arc::new(parking_lot::Mutex::new(None::<SubscriptionId>));
        let d = Arc::clone(&dispatcher);
        let s = Arc::clone(&slot);
        let id = dispatcher
            .subscribe_to_snapshot(".a", move |_| {
                if let Some(id) = *s.lock() {
                    d.unsubscribe(id);
                }
            })
            .unwrap();
        *slot.lock() = Some(id);

        dispatcher.on_snapshot(&json!({"a": 1}));

        assert!(dispatcher.is_empty());
    }

    #[test]
    fn invalid_expression_is_rejected() {
        let dispatcher = UpdateDispatcher::new();
        assert!(dispatcher.subscribe_to_snapshot(".a |", |_| {}).is_err());
        assert!(dispatcher.subscribe_to_updates("(", ".", |_, _| {}).is_err());
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn clear_removes_everything() {
        let dispatcher = UpdateDispatcher::new();
        dispatcher.subscribe_to_snapshot(".a", |_| {}).unwrap();
        dispatcher.subscribe_to_updates("^/a", ".", |_, _| {}).unwrap();
        assert_eq!(dispatcher.subscription_count(), 2);

        dispatcher.clear();
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn unique_ids_across_kinds() {
        let dispatcher = UpdateDispatcher::new();
        let a = dispatcher.subscribe_to_snapshot(".a", |_| {}).unwrap();
        let b = dispatcher.subscribe_to_updates("^/a", ".", |_, _| {}).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn dispatcher_debug() {
        let dispatcher = UpdateDispatcher::new();
        dispatcher.subscribe_to_snapshot(".a", |_| {}).unwrap();
        let debug = format!("{dispatcher:?}");
        assert!(debug.contains("UpdateDispatcher"));
        assert!(debug.contains("snapshot_subscriptions: 1"));
    }
}
