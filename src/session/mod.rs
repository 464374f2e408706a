// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed access to the Smartbox REST API.
//!
//! A [`Session`] wraps an [`ApiTransport`] and exposes one method per API
//! operation. Every call obtains a valid token from the shared
//! [`AuthTokenManager`], so a session can be used from many tasks at once.
//!
//! | Method | Request |
//! |--------|---------|
//! | [`get_devices`](Session::get_devices) | `GET devs` |
//! | [`get_homes`](Session::get_homes) | `GET grouped_devs` |
//! | [`get_nodes`](Session::get_nodes) | `GET devs/{dev}/mgr/nodes` |
//! | [`get_device_away_status`](Session::get_device_away_status) | `GET devs/{dev}/mgr/away_status` |
//! | [`get_device_power_limit`](Session::get_device_power_limit) | `GET devs/{dev}/htr_system/power_limit` |
//! | [`get_node_status`](Session::get_node_status) | `GET devs/{dev}/{type}/{addr}/status` |
//! | [`get_node_setup`](Session::get_node_setup) | `GET devs/{dev}/{type}/{addr}/setup` |
//! | [`get_node_samples`](Session::get_node_samples) | `GET devs/{dev}/{type}/{addr}/samples` |
//! | [`health_check`](Session::health_check) | `GET health_check` |

mod builder;

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Value, json};

pub use builder::SessionBuilder;

use crate::auth::AuthTokenManager;
use crate::command::{AwayStatusUpdate, NodeSetupUpdate, NodeStatusUpdate};
use crate::error::{ParseError, Result};
use crate::protocol::{ApiTransport, decode};
use crate::response::{
    Device, DeviceAwayStatus, Devices, Home, Node, NodeSetup, NodeStatus, Nodes,
    PowerLimitResponse, Sample, Samples,
};
use crate::types::NodeRef;

#[cfg(feature = "realtime")]
use crate::realtime::{RealtimeConfig, RealtimeConnection, UpdateManager};

/// An authenticated connection to a Smartbox API deployment.
///
/// # Examples
///
/// ```no_run
/// use smartbox_lib::Session;
/// use smartbox_lib::command::NodeStatusUpdate;
///
/// # async fn example() -> smartbox_lib::Result<()> {
/// let session = Session::builder("user@example.com", "password")
///     .api_name("api-elnur")
///     .build()?;
///
/// for device in session.get_devices().await? {
///     for node in session.get_nodes(&device.dev_id).await? {
///         let status = session.get_node_status(&device.dev_id, &node.node_ref()).await?;
///         println!("{}: {:?}", node.name, status.measured_temperature());
///
///         let update = NodeStatusUpdate::new().with_target_temperature(21.5, "C");
///         session.set_node_status(&device.dev_id, &node.node_ref(), &update).await?;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    transport: ApiTransport,
}

impl Session {
    /// Creates a builder for the given account.
    #[must_use]
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(username.into(), password.into())
    }

    /// Creates a session over an existing transport.
    #[must_use]
    pub fn new(transport: ApiTransport) -> Self {
        Self { transport }
    }

    /// Returns the token manager shared by all requests.
    #[must_use]
    pub fn auth(&self) -> &Arc<AuthTokenManager> {
        self.transport.auth()
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &ApiTransport {
        &self.transport
    }

    /// Lists the account's devices.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn get_devices(&self) -> Result<Vec<Device>> {
        let devices: Devices = self.transport.get_json("devs").await?;
        Ok(devices.devs)
    }

    /// Lists the account's homes with their devices.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn get_homes(&self) -> Result<Vec<Home>> {
        self.transport.get_json("grouped_devs").await
    }

    /// Lists the nodes of a device.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn get_nodes(&self, device_id: &str) -> Result<Vec<Node>> {
        let nodes: Nodes = self
            .transport
            .get_json(&device_path(device_id, "mgr/nodes"))
            .await?;
        Ok(nodes.nodes)
    }

    /// Returns the away status of a device.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn get_device_away_status(&self, device_id: &str) -> Result<DeviceAwayStatus> {
        self.transport
            .get_json(&device_path(device_id, "mgr/away_status"))
            .await
    }

    /// Changes the away status of a device.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn set_device_away_status(
        &self,
        device_id: &str,
        update: &AwayStatusUpdate,
    ) -> Result<()> {
        self.transport
            .post(&device_path(device_id, "mgr/away_status"), update)
            .await?;
        Ok(())
    }

    /// Returns the power limit of a device in watts.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the limit is not an integer.
    pub async fn get_device_power_limit(&self, device_id: &str) -> Result<i64> {
        let path = device_path(device_id, "htr_system/power_limit");
        let response: PowerLimitResponse = self.transport.get_json(&path).await?;
        response.value().ok_or_else(|| {
            ParseError::MalformedResponse(format!(
                "{path}: invalid power limit {}",
                response.power_limit
            ))
            .into()
        })
    }

    /// Sets the power limit of a device in watts.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn set_device_power_limit(&self, device_id: &str, power_limit: i64) -> Result<()> {
        // The API expects the limit as a string.
        let body = json!({ "power_limit": power_limit.to_string() });
        self.transport
            .post(&device_path(device_id, "htr_system/power_limit"), &body)
            .await?;
        Ok(())
    }

    /// Returns the status of a node.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn get_node_status(&self, device_id: &str, node: &NodeRef) -> Result<NodeStatus> {
        self.transport
            .get_json(&node_path(device_id, node, "status"))
            .await
    }

    /// Changes the status of a node.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::MissingUnits`](crate::error::ValueError::MissingUnits)
    /// if a target temperature is set without units, or error if the request fails.
    pub async fn set_node_status(
        &self,
        device_id: &str,
        node: &NodeRef,
        update: &NodeStatusUpdate,
    ) -> Result<()> {
        update.validate()?;
        self.transport
            .post(&node_path(device_id, node, "status"), update)
            .await?;
        Ok(())
    }

    /// Returns the setup of a node.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn get_node_setup(&self, device_id: &str, node: &NodeRef) -> Result<NodeSetup> {
        self.transport
            .get_json(&node_path(device_id, node, "setup"))
            .await
    }

    /// Changes the setup of a node.
    ///
    /// The API replaces the whole setup, so the changes are merged onto the
    /// current setup before it is sent back.
    ///
    /// # Errors
    ///
    /// Returns error if either request fails or the current setup is malformed.
    pub async fn set_node_setup(
        &self,
        device_id: &str,
        node: &NodeRef,
        changes: &NodeSetupUpdate,
    ) -> Result<()> {
        if changes.is_empty() {
            tracing::debug!(node = %node, "No setup changes to send");
            return Ok(());
        }

        let path = node_path(device_id, node, "setup");
        let current = self.transport.get(&path).await?;
        decode::<NodeSetup>(&path, current.clone())?;

        let Value::Object(mut setup) = current else {
            return Err(
                ParseError::MalformedResponse(format!("{path}: setup is not an object")).into(),
            );
        };
        changes.apply_to(&mut setup);

        self.transport.post(&path, &setup).await?;
        Ok(())
    }

    /// Returns the temperature samples of a node between `start` and `end`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn get_node_samples(
        &self,
        device_id: &str,
        node: &NodeRef,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        let path = format!(
            "{}?start={}&end={}",
            node_path(device_id, node, "samples"),
            start.timestamp(),
            end.timestamp()
        );
        let samples: Samples = self.transport.get_json(&path).await?;
        Ok(samples.samples)
    }

    /// Returns the samples of the hour before and after now.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn get_recent_node_samples(
        &self,
        device_id: &str,
        node: &NodeRef,
    ) -> Result<Vec<Sample>> {
        let now = Utc::now();
        let hour = TimeDelta::hours(1);
        self.get_node_samples(device_id, node, now - hour, now + hour)
            .await
    }

    /// Queries the unauthenticated health endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the service is unreachable or rejects the request.
    pub async fn health_check(&self) -> Result<Value> {
        self.transport.get_public("health_check").await
    }

    /// Creates a realtime connection sharing this session's tokens.
    #[cfg(feature = "realtime")]
    #[must_use]
    pub fn realtime_connection(&self, config: RealtimeConfig) -> RealtimeConnection {
        RealtimeConnection::new(Arc::clone(self.auth()), config)
    }

    /// Creates an update manager for a device sharing this session's tokens.
    #[cfg(feature = "realtime")]
    #[must_use]
    pub fn update_manager(
        &self,
        device_id: impl Into<String>,
        config: RealtimeConfig,
    ) -> UpdateManager {
        UpdateManager::new(Arc::clone(self.auth()), device_id, config)
    }
}

fn device_path(device_id: &str, rest: &str) -> String {
    format!("devs/{}/{rest}", urlencoding::encode(device_id))
}

fn node_path(device_id: &str, node: &NodeRef, field: &str) -> String {
    let node_type = urlencoding::encode(node.node_type().as_str());
    device_path(device_id, &format!("{node_type}/{}/{field}", node.addr()))
}
