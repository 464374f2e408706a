// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request bodies for device and node settings.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ValueError;

/// Changes to the device away status.
///
/// Unset fields are left unchanged on the device.
///
/// # Examples
///
/// ```
/// use smartbox_lib::command::AwayStatusUpdate;
///
/// let update = AwayStatusUpdate::new().with_away(true);
/// assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"away":true}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AwayStatusUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    away: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    forced: Option<bool>,
}

impl AwayStatusUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables away detection.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Enters or leaves away mode.
    #[must_use]
    pub fn with_away(mut self, away: bool) -> Self {
        self.away = Some(away);
        self
    }

    /// Marks away mode as forced by the user.
    #[must_use]
    pub fn with_forced(mut self, forced: bool) -> Self {
        self.forced = Some(forced);
        self
    }
}

/// Changes to a node status.
///
/// A target temperature must be sent together with its units.
///
/// # Examples
///
/// ```
/// use smartbox_lib::command::NodeStatusUpdate;
///
/// let update = NodeStatusUpdate::new()
///     .with_mode("manual")
///     .with_target_temperature(21.5, "C");
/// assert!(update.validate().is_ok());
///
/// let missing_units = NodeStatusUpdate::new().with_field("stemp", "21.5");
/// assert!(missing_units.validate().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeStatusUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stemp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    units: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    boost: Option<bool>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl NodeStatusUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the operating mode (`auto`, `manual`, `off`, ...).
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self.extra.remove("mode");
        self
    }

    /// Sets the target temperature and its units.
    #[must_use]
    pub fn with_target_temperature(mut self, temperature: f64, units: impl Into<String>) -> Self {
        self.stemp = Some(format!("{temperature:.1}"));
        self.units = Some(units.into());
        self.extra.remove("stemp");
        self.extra.remove("units");
        self
    }

    /// Sets the temperature units.
    #[must_use]
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self.extra.remove("units");
        self
    }

    /// Locks or unlocks the node controls.
    #[must_use]
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = Some(locked);
        self.extra.remove("locked");
        self
    }

    /// Starts or stops boost.
    #[must_use]
    pub fn with_boost(mut self, boost: bool) -> Self {
        self.boost = Some(boost);
        self.extra.remove("boost");
        self
    }

    /// Sets any status field. `null` values are ignored.
    ///
    /// Fields with a typed setter replace the typed value, so every key is
    /// sent once. A value of another JSON type is sent as given.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        if value.is_null() {
            return self;
        }
        match (key.as_str(), value) {
            ("mode", Value::String(s)) => self.mode = Some(s),
            ("stemp", Value::String(s)) => self.stemp = Some(s),
            ("units", Value::String(s)) => self.units = Some(s),
            ("locked", Value::Bool(b)) => self.locked = Some(b),
            ("boost", Value::Bool(b)) => self.boost = Some(b),
            (_, value) => {
                self.clear_typed(&key);
                self.extra.insert(key, value);
                return self;
            }
        }
        self.extra.remove(&key);
        self
    }

    fn clear_typed(&mut self, key: &str) {
        match key {
            "mode" => self.mode = None,
            "stemp" => self.stemp = None,
            "units" => self.units = None,
            "locked" => self.locked = None,
            "boost" => self.boost = None,
            _ => {}
        }
    }

    /// Checks the update before it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::MissingUnits`] if a target temperature is set
    /// without units.
    pub fn validate(&self) -> Result<(), ValueError> {
        let has_stemp = self.stemp.is_some() || self.extra.contains_key("stemp");
        let has_units = self.units.is_some() || self.extra.contains_key("units");
        if has_stemp && !has_units {
            return Err(ValueError::MissingUnits);
        }
        Ok(())
    }
}

/// Changes to a node setup.
///
/// The API expects the complete setup on every write, so these changes are
/// merged onto the current setup before being sent.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use smartbox_lib::command::NodeSetupUpdate;
///
/// let update = NodeSetupUpdate::new().with_true_radiant(true);
/// let mut setup = json!({"units": "C", "true_radiant_enabled": false})
///     .as_object()
///     .cloned()
///     .unwrap();
/// update.apply_to(&mut setup);
/// assert_eq!(setup["true_radiant_enabled"], json!(true));
/// assert_eq!(setup["units"], json!("C"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSetupUpdate {
    changes: Map<String, Value>,
}

impl NodeSetupUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the temperature units.
    #[must_use]
    pub fn with_units(self, units: impl Into<String>) -> Self {
        self.with_field("units", units.into())
    }

    /// Sets the away mode behaviour.
    #[must_use]
    pub fn with_away_mode(self, away_mode: i64) -> Self {
        self.with_field("away_mode", away_mode)
    }

    /// Enables or disables open-window detection.
    #[must_use]
    pub fn with_window_mode(self, enabled: bool) -> Self {
        self.with_field("window_mode_enabled", enabled)
    }

    /// Enables or disables true radiant mode.
    #[must_use]
    pub fn with_true_radiant(self, enabled: bool) -> Self {
        self.with_field("true_radiant_enabled", enabled)
    }

    /// Sets any other setup field. `null` values are ignored.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.changes.insert(key.into(), value);
        }
        self
    }

    /// Returns `true` if there are no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Overwrites the changed fields of `setup`.
    pub fn apply_to(&self, setup: &mut Map<String, Value>) {
        for (key, value) in &self.changes {
            setup.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn away_status_omits_unset_fields() {
        let update = AwayStatusUpdate::new().with_enabled(true).with_forced(false);
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"enabled": true, "forced": false})
        );
    }

    #[test]
    fn node_status_serializes_target_temperature() {
        let update = NodeStatusUpdate::new().with_target_temperature(20.0, "C");
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"stemp": "20.0", "units": "C"})
        );
    }

    #[test]
    fn node_status_requires_units_with_temperature() {
        assert_eq!(
            NodeStatusUpdate::new().with_field("stemp", "19.5").validate(),
            Err(ValueError::MissingUnits)
        );
        assert!(
            NodeStatusUpdate::new()
                .with_field("stemp", "19.5")
                .with_units("F")
                .validate()
                .is_ok()
        );
        assert!(NodeStatusUpdate::new().with_mode("off").validate().is_ok());
    }

    #[test]
    fn node_status_ignores_null_fields() {
        let update = NodeStatusUpdate::new()
            .with_field("duty", Value::Null)
            .with_field("ice_temp", "7.0");
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"ice_temp": "7.0"})
        );
    }

    #[test]
    fn node_status_sends_each_key_once() {
        let update = NodeStatusUpdate::new()
            .with_field("boost", true)
            .with_boost(false);
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"boost":false}"#);

        let update = NodeStatusUpdate::new()
            .with_boost(false)
            .with_field("boost", true);
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"boost":true}"#);

        let update = NodeStatusUpdate::new()
            .with_locked(true)
            .with_field("locked", 1)
            .with_field("stemp", 21)
            .with_target_temperature(19.0, "C");
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"stemp":"19.0","units":"C","locked":1}"#
        );
    }

    #[test]
    fn node_setup_merges_changes() {
        let update = NodeSetupUpdate::new()
            .with_units("F")
            .with_field("ignored", Value::Null);
        assert!(!update.is_empty());

        let mut setup = Map::new();
        setup.insert("units".into(), json!("C"));
        setup.insert("control_mode".into(), json!(5));
        update.apply_to(&mut setup);

        assert_eq!(Value::Object(setup), json!({"units": "F", "control_mode": 5}));
    }
}
