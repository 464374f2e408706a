// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node addressing types.
//!
//! A device manages several nodes (heaters, accumulators, thermostats, power
//! meters). Each node is addressed by its type and a numeric address, which
//! together form the `/<type>/<addr>` path segment used by the REST API and by
//! realtime updates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// The kind of a node.
///
/// # Examples
///
/// ```
/// use smartbox_lib::types::NodeType;
///
/// let htr: NodeType = "htr".parse().unwrap();
/// assert_eq!(htr, NodeType::Heater);
/// assert_eq!(htr.as_str(), "htr");
///
/// // Unknown types are kept as-is
/// let other: NodeType = "htr_mod".parse().unwrap();
/// assert_eq!(other.as_str(), "htr_mod");
///
/// assert!("".parse::<NodeType>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NodeType {
    /// Electric heater (`htr`).
    Heater,
    /// Storage heater (`acm`).
    Accumulator,
    /// Thermostat (`thm`).
    Thermostat,
    /// Power meter (`pmo`).
    PowerMeter,
    /// Any other node type reported by the API.
    Other(String),
}

impl NodeType {
    /// Returns the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heater => "htr",
            Self::Accumulator => "acm",
            Self::Thermostat => "thm",
            Self::PowerMeter => "pmo",
            Self::Other(s) => s,
        }
    }

    /// Returns `true` for nodes that heat (heaters and accumulators).
    #[must_use]
    pub fn is_heating(&self) -> bool {
        matches!(self, Self::Heater | Self::Accumulator)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.contains('/') || s.contains(char::is_whitespace) {
            return Err(ValueError::InvalidNodeType(s.to_string()));
        }
        Ok(match s {
            "htr" => Self::Heater,
            "acm" => Self::Accumulator,
            "thm" => Self::Thermostat,
            "pmo" => Self::PowerMeter,
            other => Self::Other(other.to_string()),
        })
    }
}

impl TryFrom<String> for NodeType {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeType> for String {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// Reference to one node of a device.
///
/// # Examples
///
/// ```
/// use smartbox_lib::types::{NodeRef, NodeType};
///
/// let node = NodeRef::new(NodeType::Heater, 2);
/// assert_eq!(node.path(), "htr/2");
///
/// let parsed: NodeRef = "acm/1".parse().unwrap();
/// assert_eq!(parsed.node_type(), &NodeType::Accumulator);
/// assert_eq!(parsed.addr(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    node_type: NodeType,
    addr: u32,
}

impl NodeRef {
    /// Creates a node reference.
    #[must_use]
    pub fn new(node_type: NodeType, addr: u32) -> Self {
        Self { node_type, addr }
    }

    /// Returns the node type.
    #[must_use]
    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    /// Returns the node address.
    #[must_use]
    pub fn addr(&self) -> u32 {
        self.addr
    }

    /// Returns the `<type>/<addr>` path segment.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.node_type, self.addr)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node_type, self.addr)
    }
}

impl FromStr for NodeRef {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (node_type, addr) = s
            .trim_matches('/')
            .split_once('/')
            .ok_or_else(|| ValueError::InvalidAddress(s.to_string()))?;
        let addr = addr
            .parse()
            .map_err(|_| ValueError::InvalidAddress(s.to_string()))?;
        Ok(Self::new(node_type.parse()?, addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_node_types_round_trip() {
        for (s, t) in [
            ("htr", NodeType::Heater),
            ("acm", NodeType::Accumulator),
            ("thm", NodeType::Thermostat),
            ("pmo", NodeType::PowerMeter),
        ] {
            assert_eq!(s.parse::<NodeType>().unwrap(), t);
            assert_eq!(String::from(t), s);
        }
    }

    #[test]
    fn node_type_rejects_path_separators() {
        assert_eq!(
            "htr/1".parse::<NodeType>(),
            Err(ValueError::InvalidNodeType("htr/1".to_string()))
        );
        assert!("".parse::<NodeType>().is_err());
        assert!("h tr".parse::<NodeType>().is_err());
    }

    #[test]
    fn node_type_deserializes_from_json() {
        let t: NodeType = serde_json::from_str("\"acm\"").unwrap();
        assert_eq!(t, NodeType::Accumulator);
        assert!(t.is_heating());
        assert!(serde_json::from_str::<NodeType>("\"\"").is_err());
    }

    #[test]
    fn node_ref_parse_and_display() {
        let node: NodeRef = "/htr/3".parse().unwrap();
        assert_eq!(node, NodeRef::new(NodeType::Heater, 3));
        assert_eq!(node.to_string(), "htr/3");
    }

    #[test]
    fn node_ref_rejects_bad_addresses() {
        assert!(matches!(
            "htr".parse::<NodeRef>(),
            Err(ValueError::InvalidAddress(_))
        ));
        assert!(matches!(
            "htr/x".parse::<NodeRef>(),
            Err(ValueError::InvalidAddress(_))
        ));
        assert!(matches!(
            "htr/-1".parse::<NodeRef>(),
            Err(ValueError::InvalidAddress(_))
        ));
    }
}
