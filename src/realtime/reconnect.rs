// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Backoff between realtime reconnection attempts.
//!
//! [`UpdateManager`](super::UpdateManager) consults the policy whenever the
//! Socket.IO connection is lost or cannot be established. Attempts are
//! counted from the last successful connection, so a stream that drops after
//! running for hours starts again from the initial delay.

use std::time::Duration;

/// How [`UpdateManager`](super::UpdateManager) reconnects to the realtime
/// endpoint.
///
/// Attempt `n` (0-based) waits `initial_delay * backoff_multiplier^n` before
/// connecting, never more than `max_delay`. Authentication failures are never
/// retried, whatever the policy says.
///
/// # Examples
///
/// ```
/// use smartbox_lib::realtime::ReconnectionPolicy;
/// use std::time::Duration;
///
/// // Reconnects forever: 1 s, 2 s, 4 s, ... up to one minute
/// let policy = ReconnectionPolicy::default();
/// assert!(policy.should_retry(1_000));
/// assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(60));
///
/// // Give up on the first lost connection
/// assert!(!ReconnectionPolicy::disabled().should_retry(0));
///
/// let policy = ReconnectionPolicy::new()
///     .with_max_retries(5)
///     .with_initial_delay(Duration::from_millis(500))
///     .with_max_delay(Duration::from_secs(10));
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
/// assert!(!policy.should_retry(5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectionPolicy {
    enabled: bool,
    max_retries: Option<u32>,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl ReconnectionPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy under which a lost connection ends
    /// [`UpdateManager::run`](super::UpdateManager::run).
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Limits the reconnection attempts made in a row without a successful
    /// connection.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Removes the attempt limit.
    #[must_use]
    pub fn with_infinite_retries(mut self) -> Self {
        self.max_retries = None;
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor of the delay. Values below `1.0` act as `1.0`.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Attempt limit, `None` when reconnecting forever.
    #[must_use]
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Time to wait before reconnection attempt `attempt` (0-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if secs.is_finite() && secs < self.max_delay.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max_delay
        }
    }

    /// Returns `true` if reconnection attempt `attempt` (0-based) may be made.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && self.max_retries.is_none_or(|max| attempt < max)
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = ReconnectionPolicy::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(10));

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn multiplier_below_one_keeps_initial_delay() {
        let policy = ReconnectionPolicy::new()
            .with_initial_delay(Duration::from_millis(200))
            .with_backoff_multiplier(0.5);
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(200));
    }

    #[test]
    fn retry_limits() {
        let policy = ReconnectionPolicy::new().with_max_retries(2);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));

        assert!(ReconnectionPolicy::new().with_infinite_retries().should_retry(u32::MAX));
        assert!(!ReconnectionPolicy::disabled().should_retry(0));
        assert!(!ReconnectionPolicy::disabled().is_enabled());
    }

    #[test]
    fn default_reconnects_forever() {
        let policy = ReconnectionPolicy::default();
        assert!(policy.is_enabled());
        assert_eq!(policy.max_retries(), None);
        assert_eq!(policy.initial_delay(), Duration::from_secs(1));
        assert_eq!(policy.max_delay(), Duration::from_secs(60));
    }
}
