// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for smartbox device control.
//!
//! # Types
//!
//! - [`NodeType`] - Kind of node (heater, accumulator, thermostat, power meter)
//! - [`NodeRef`] - Node type and address, rendered as `<type>/<addr>`

mod node;

pub use node::{NodeRef, NodeType};
