// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node topology, status, setup and sample responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{NodeRef, NodeType};

/// A node managed by a device.
///
/// # Examples
///
/// ```
/// use smartbox_lib::response::Nodes;
/// use smartbox_lib::types::NodeType;
///
/// let json = r#"{"nodes": [
///     {"name": "Bedroom", "addr": 1, "type": "htr", "installed": true, "lost": false}
/// ]}"#;
/// let nodes: Nodes = serde_json::from_str(json).unwrap();
/// let node = &nodes.nodes[0];
/// assert_eq!(node.node_type, NodeType::Heater);
/// assert_eq!(node.node_ref().path(), "htr/1");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// User-visible name.
    pub name: String,
    /// Address of the node on its device.
    pub addr: u32,
    /// Node type.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Whether the node is installed.
    pub installed: bool,
    /// Whether the device lost contact with the node.
    pub lost: bool,
    /// Status, when embedded in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    /// Setup, when embedded in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<NodeSetup>,
}

impl Node {
    /// Returns the reference used to address this node.
    #[must_use]
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.node_type.clone(), self.addr)
    }
}

impl From<&Node> for NodeRef {
    fn from(node: &Node) -> Self {
        node.node_ref()
    }
}

/// Response of `GET devs/{dev_id}/mgr/nodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nodes {
    /// Nodes of the device.
    pub nodes: Vec<Node>,
}

/// Current state of a node.
///
/// Fields vary with the node type, so every known field is optional and
/// unknown fields are kept in [`extra`](Self::extra). Temperatures are
/// decimal strings in the node's [`units`](Self::units).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Operating mode (`auto`, `manual`, `off`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Whether the node is currently heating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Target temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stemp: Option<String>,
    /// Measured temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtemp: Option<String>,
    /// Temperature units (`C` or `F`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Rated power.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<String>,
    /// Comfort preset temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comf_temp: Option<String>,
    /// Eco preset temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eco_temp: Option<String>,
    /// Frost protection temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_temp: Option<String>,
    /// Whether the node controls are locked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<i64>,
    /// Whether boost is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<bool>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeStatus {
    /// Returns the target temperature.
    #[must_use]
    pub fn target_temperature(&self) -> Option<f64> {
        parse_temperature(self.stemp.as_deref())
    }

    /// Returns the measured temperature.
    #[must_use]
    pub fn measured_temperature(&self) -> Option<f64> {
        parse_temperature(self.mtemp.as_deref())
    }
}

/// Configuration of a node.
///
/// Like [`NodeStatus`], fields depend on the node type and unknown fields
/// are kept in [`extra`](Self::extra).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSetup {
    /// Temperature units (`C` or `F`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Control mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_mode: Option<i64>,
    /// Away mode behaviour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_mode: Option<i64>,
    /// Temperature offset applied in away mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_offset: Option<String>,
    /// Sensor offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    /// Whether open-window detection is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_mode_enabled: Option<bool>,
    /// Whether true radiant mode is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_radiant_enabled: Option<bool>,
    /// Firmware version of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_version: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One temperature sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in seconds.
    pub t: i64,
    /// Temperature as a decimal string.
    pub temp: String,
    /// Cumulative energy counter.
    pub counter: i64,
}

impl Sample {
    /// Returns the sample temperature.
    #[must_use]
    pub fn temperature(&self) -> Option<f64> {
        parse_temperature(Some(&self.temp))
    }
}

/// Response of `GET devs/{dev_id}/{type}/{addr}/samples`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Samples {
    /// Samples in chronological order.
    pub samples: Vec<Sample>,
}

fn parse_temperature(value: Option<&str>) -> Option<f64> {
    value.and_then(|s| s.trim().parse().ok())
}
