// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response models for the smartbox REST API.
//!
//! Responses are validated when they are decoded: a body that does not match
//! its model is reported as
//! [`ParseError::MalformedResponse`](crate::error::ParseError::MalformedResponse).

mod device;
mod node;

pub(crate) use device::PowerLimitResponse;
pub use device::{Device, DeviceAwayStatus, Devices, Home};
pub use node::{Node, NodeSetup, NodeStatus, Nodes, Sample, Samples};
