// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Composite subscriptions for well-known device fields.
//!
//! A device reports a field either inside the full snapshot sent when the
//! realtime connection opens or later as a path-addressed update. Each
//! composite subscription registers one snapshot subscription and one update
//! subscription on the same callback, so consumers see the value whichever way
//! it arrives.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::subscription::{PathMatch, SubscriptionId, UpdateDispatcher};

const AWAY_STATUS_SNAPSHOT: &str = ".away_status";
const AWAY_STATUS_UPDATE: &str = "^/mgr/away_status$";
const POWER_LIMIT_SNAPSHOT: &str = ".htr_system.setup.power_limit";
const POWER_LIMIT_UPDATE: &str = "^/htr_system/(setup|power_limit)$";
const POWER_LIMIT_UPDATE_EXPR: &str = ".power_limit";

/// The pair of subscriptions behind a composite subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeSubscription {
    /// The subscription on device snapshots.
    pub snapshot: SubscriptionId,
    /// The subscription on device updates.
    pub update: SubscriptionId,
}

/// Trait for types that support composite device subscriptions.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use smartbox_lib::event::Update;
/// use smartbox_lib::subscription::{Subscribable, UpdateDispatcher};
///
/// # fn main() -> smartbox_lib::Result<()> {
/// let dispatcher = UpdateDispatcher::new();
///
/// let sub = dispatcher.on_node_status(|node_type, addr, status| {
///     println!("{node_type}/{addr} status: {status}");
/// })?;
///
/// // Fired from a snapshot...
/// dispatcher.on_snapshot(&json!({"nodes": [{"type": "htr", "addr": 1, "status": {"mode": "auto"}}]}));
/// // ...and from an update
/// dispatcher.on_update(&Update::new("/htr/1/status", json!({"mode": "off"})));
///
/// dispatcher.unsubscribe_composite(sub);
/// # Ok(())
/// # }
/// ```
pub trait Subscribable {
    /// Subscribes to the device away status.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be registered.
    fn on_device_away_status<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(&Value) + Send + Sync + 'static;

    /// Subscribes to the device power limit.
    ///
    /// The limit is reported as a string or a number; both are converted to
    /// an integer. Values that are neither are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be registered.
    fn on_device_power_limit<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(i64) + Send + Sync + 'static;

    /// Subscribes to node status changes.
    ///
    /// The callback receives the node type, the node address and the status.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be registered.
    fn on_node_status<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(&str, u32, &Value) + Send + Sync + 'static;

    /// Subscribes to node setup changes.
    ///
    /// The callback receives the node type, the node address and the setup.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be registered.
    fn on_node_setup<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(&str, u32, &Value) + Send + Sync + 'static;

    /// Removes both halves of a composite subscription.
    ///
    /// Returns `true` if at least one of them was registered.
    fn unsubscribe_composite(&self, subscription: CompositeSubscription) -> bool;
}

impl Subscribable for UpdateDispatcher {
    fn on_device_away_status<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let on_update = Arc::clone(&callback);
        self.register_pair(
            AWAY_STATUS_SNAPSHOT,
            move |value| callback(value),
            AWAY_STATUS_UPDATE,
            ".",
            move |value, _| on_update(value),
        )
    }

    fn on_device_power_limit<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let on_update = Arc::clone(&callback);
        self.register_pair(
            POWER_LIMIT_SNAPSHOT,
            move |value| {
                if let Some(limit) = power_limit(value) {
                    callback(limit);
                }
            },
            POWER_LIMIT_UPDATE,
            POWER_LIMIT_UPDATE_EXPR,
            move |value, _| {
                if let Some(limit) = power_limit(value) {
                    on_update(limit);
                }
            },
        )
    }

    fn on_node_status<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(&str, u32, &Value) + Send + Sync + 'static,
    {
        self.register_node_field("status", callback)
    }

    fn on_node_setup<F>(&self, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(&str, u32, &Value) + Send + Sync + 'static,
    {
        self.register_node_field("setup", callback)
    }

    fn unsubscribe_composite(&self, subscription: CompositeSubscription) -> bool {
        let snapshot = self.unsubscribe(subscription.snapshot);
        let update = self.unsubscribe(subscription.update);
        snapshot || update
    }
}

impl UpdateDispatcher {
    fn register_pair<S, U>(
        &self,
        snapshot_expression: &str,
        on_snapshot: S,
        update_pattern: &str,
        update_expression: &str,
        on_update: U,
    ) -> Result<CompositeSubscription>
    where
        S: Fn(&Value) + Send + Sync + 'static,
        U: Fn(&Value, &PathMatch) + Send + Sync + 'static,
    {
        let snapshot = self.subscribe_to_snapshot(snapshot_expression, on_snapshot)?;
        match self.subscribe_to_updates(update_pattern, update_expression, on_update) {
            Ok(update) => Ok(CompositeSubscription { snapshot, update }),
            Err(err) => {
                self.unsubscribe(snapshot);
                Err(err)
            }
        }
    }

    /// Registers a node-addressed field such as `status` or `setup`.
    ///
    /// Snapshots carry the field inside each entry of the `nodes` array;
    /// updates address it as `/<node_type>/<addr>/<field>`.
    fn register_node_field<F>(&self, field: &str, callback: F) -> Result<CompositeSubscription>
    where
        F: Fn(&str, u32, &Value) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let on_update = Arc::clone(&callback);
        let snapshot_expression =
            format!(".nodes[] | select(.{field} != null) | {{type, addr, {field}}}");
        let update_pattern = format!(r"^/(?P<node_type>[^/]+)/(?P<addr>\d+)/{field}$");
        let snapshot_field = field.to_string();

        self.register_pair(
            &snapshot_expression,
            move |node| {
                let node_type = node.get("type").and_then(Value::as_str);
                let addr = node.get("addr").and_then(node_addr);
                match (node_type, addr, node.get(&snapshot_field)) {
                    (Some(node_type), Some(addr), Some(value)) => callback(node_type, addr, value),
                    _ => tracing::warn!(node = %node, "Ignoring snapshot node without type or address"),
                }
            },
            &update_pattern,
            ".",
            move |value, path| {
                let node_type = path.name("node_type");
                let addr = path.name("addr").and_then(|a| a.parse::<u32>().ok());
                match (node_type, addr) {
                    (Some(node_type), Some(addr)) => on_update(node_type, addr, value),
                    _ => tracing::warn!(path = %path.path(), "Ignoring update with invalid node address"),
                }
            },
        )
    }
}

/// Reads a node address given as a number or a numeric string.
fn node_addr(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Reads a power limit given as a number or a numeric string.
fn power_limit(value: &Value) -> Option<i64> {
    let limit = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    if limit.is_none() {
        tracing::warn!(value = %value, "Ignoring unparseable power limit");
    }
    limit
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::event::Update;

    type NodeCall = (String, u32, Value);

    fn node_recorder() -> (Arc<Mutex<Vec<NodeCall>>>, impl Fn(&str, u32, &Value) + Send + Sync) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        (calls, move |t: &str, a: u32, v: &Value| {
            sink.lock().push((t.to_string(), a, v.clone()));
        })
    }

    #[test]
    fn away_status_from_snapshot_and_update() {
        let dispatcher = UpdateDispatcher::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        dispatcher
            .on_device_away_status(move |v| sink.lock().push(v.clone()))
            .unwrap();
        assert_eq!(dispatcher.snapshot_subscription_count(), 1);
        assert_eq!(dispatcher.update_subscription_count(), 1);

        dispatcher.on_snapshot(&json!({"away_status": "away"}));
        assert_eq!(*calls.lock(), vec![json!("away")]);

        calls.lock().clear();
        dispatcher.on_update(&Update::new("/mgr/away_status", json!("away")));
        assert_eq!(*calls.lock(), vec![json!("away")]);
    }

    #[test]
    fn node_status_from_snapshot_and_update() {
        let dispatcher = UpdateDispatcher::new();
        let (calls, callback) = node_recorder();
        dispatcher.on_node_status(callback).unwrap();

        dispatcher.on_snapshot(&json!({"nodes": [{"type": "htr", "addr": 1, "status": {"k": "v"}}]}));
        assert_eq!(
            *calls.lock(),
            vec![("htr".to_string(), 1, json!({"k": "v"}))]
        );

        calls.lock().clear();
        dispatcher.on_update(&Update::new("/htr/1/status", json!({"k": "v"})));
        assert_eq!(
            *calls.lock(),
            vec![("htr".to_string(), 1, json!({"k": "v"}))]
        );
    }

    #[test]
    fn node_setup_ignores_status_paths_and_nodes_without_setup() {
        let dispatcher = UpdateDispatcher::new();
        let (calls, callback) = node_recorder();
        dispatcher.on_node_setup(callback).unwrap();

        dispatcher.on_snapshot(&json!({"nodes": [
            {"type": "htr", "addr": 1, "status": {"k": "v"}},
            {"type": "acm", "addr": 2, "setup": {"units": "C"}}
        ]}));
        dispatcher.on_update(&Update::new("/htr/1/status", json!({"k": "v"})));
        dispatcher.on_update(&Update::new("/acm/2/setup", json!({"units": "F"})));

        assert_eq!(
            *calls.lock(),
            vec![
                ("acm".to_string(), 2, json!({"units": "C"})),
                ("acm".to_string(), 2, json!({"units": "F"})),
            ]
        );
    }

    #[test]
    fn node_status_ignores_device_level_paths() {
        let dispatcher = UpdateDispatcher::new();
        let (calls, callback) = node_recorder();
        dispatcher.on_node_status(callback).unwrap();

        let stats = dispatcher.on_update(&Update::new("/mgr/status", json!({})));

        assert_eq!(stats.matched, 0);
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn power_limit_parses_strings_and_numbers() {
        let dispatcher = UpdateDispatcher::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        dispatcher
            .on_device_power_limit(move |limit| sink.lock().push(limit))
            .unwrap();

        dispatcher.on_snapshot(&json!({"htr_system": {"setup": {"power_limit": "1500"}}}));
        dispatcher.on_update(&Update::new("/htr_system/power_limit", json!({"power_limit": 2000})));
        dispatcher.on_update(&Update::new("/htr_system/setup", json!({"power_limit": "abc"})));

        assert_eq!(*calls.lock(), vec![1500, 2000]);
    }

    #[test]
    fn unsubscribe_composite_removes_both() {
        let dispatcher = UpdateDispatcher::new();
        let sub = dispatcher.on_device_away_status(|_| {}).unwrap();

        assert!(dispatcher.unsubscribe_composite(sub));
        assert!(dispatcher.is_empty());
        assert!(!dispatcher.unsubscribe_composite(sub));
    }

    #[test]
    fn node_addr_accepts_numeric_strings() {
        assert_eq!(node_addr(&json!(3)), Some(3));
        assert_eq!(node_addr(&json!("7")), Some(7));
        assert_eq!(node_addr(&json!(-1)), None);
        assert_eq!(node_addr(&json!(null)), None);
    }
}
