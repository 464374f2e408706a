// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device, home and device-level setting responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::Node;

/// A device (gateway) registered to the account.
///
/// # Examples
///
/// ```
/// use smartbox_lib::response::Devices;
///
/// let json = r#"{
///     "devs": [{
///         "dev_id": "abc123",
///         "name": "Living room",
///         "product_id": "0x1234",
///         "fw_version": "1.0",
///         "serial_id": "7"
///     }],
///     "invited_to": []
/// }"#;
/// let devices: Devices = serde_json::from_str(json).unwrap();
/// assert_eq!(devices.devs[0].dev_id, "abc123");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier used in API paths and realtime connections.
    pub dev_id: String,
    /// User-visible name.
    pub name: String,
    /// Product identifier.
    pub product_id: String,
    /// Firmware version.
    pub fw_version: String,
    /// Reseller serial id.
    pub serial_id: String,
    /// Nodes, when the response embeds them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Node>>,
}

/// Response of `GET devs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Devices {
    /// Devices owned by the account.
    pub devs: Vec<Device>,
    /// Devices shared with the account.
    pub invited_to: Vec<Value>,
}

/// A home grouping several devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Home {
    /// Home identifier.
    pub id: String,
    /// User-visible name.
    pub name: String,
    /// Devices in the home.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devs: Option<Vec<Device>>,
    /// Whether the account owns the home.
    pub owner: bool,
}

/// Device away (holiday) status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAwayStatus {
    /// Whether away detection is enabled.
    pub enabled: bool,
    /// Whether the device is currently in away mode.
    pub away: bool,
    /// Whether away mode was forced by the user.
    pub forced: bool,
}

/// Response of `GET htr_system/power_limit`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct PowerLimitResponse {
    pub power_limit: Value,
}

impl PowerLimitResponse {
    /// Returns the limit; the API reports it as a string or a number.
    pub fn value(&self) -> Option<i64> {
        match &self.power_limit {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
