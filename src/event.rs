// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Realtime events pushed by a device.
//!
//! A realtime connection produces two kinds of events:
//!
//! - [`Event::Snapshot`] - the full device state, sent once per connection
//! - [`Event::Update`] - one changed field, addressed by a path such as
//!   `/mgr/away_status` or `/htr/2/status`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An incremental, path-addressed update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Path of the changed field.
    pub path: String,
    /// New value of the field.
    #[serde(default)]
    pub body: Value,
}

impl Update {
    /// Creates a new update.
    #[must_use]
    pub fn new(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            body,
        }
    }
}

/// An event received from the realtime connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Full point-in-time device state.
    Snapshot(Value),
    /// A single changed field.
    Update(Update),
}

impl Event {
    /// Returns the event body.
    #[must_use]
    pub fn body(&self) -> &Value {
        match self {
            Self::Snapshot(body) => body,
            Self::Update(update) => &update.body,
        }
    }
}

/// Consumer of realtime events.
///
/// Events are delivered one at a time, in arrival order, from the task
/// running the connection.
pub trait EventSink {
    /// Handles one event.
    fn handle_event(&self, event: Event);
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    fn handle_event(&self, event: Event) {
        (**self).handle_event(event);
    }
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<Event> {
    fn handle_event(&self, event: Event) {
        if self.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn update_deserializes_from_wire_shape() {
        let update: Update =
            serde_json::from_value(json!({"path": "/htr/1/status", "body": {"mode": "auto"}}))
                .unwrap();
        assert_eq!(update.path, "/htr/1/status");
        assert_eq!(update.body, json!({"mode": "auto"}));
    }

    #[test]
    fn update_without_body_is_null() {
        let update: Update = serde_json::from_value(json!({"path": "/mgr/x"})).unwrap();
        assert!(update.body.is_null());
    }

    #[test]
    fn event_body() {
        let snapshot = Event::Snapshot(json!({"a": 1}));
        assert_eq!(snapshot.body(), &json!({"a": 1}));

        let update = Event::Update(Update::new("/mgr/away_status", json!("away")));
        assert_eq!(update.body(), &json!("away"));
    }

    #[test]
    fn channel_sink_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.handle_event(Event::Snapshot(json!({})));
        assert_eq!(rx.try_recv().unwrap(), Event::Snapshot(json!({})));
    }
}
