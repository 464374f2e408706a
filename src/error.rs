// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the smartbox library.
//!
//! This module provides the error hierarchy used across the library: transport
//! and authentication failures, response validation, extraction expressions,
//! request values and subscription callbacks.

use thiserror::Error;

use crate::subscription::SubscriptionId;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during protocol communication (REST or realtime).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while validating a response.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A request argument was rejected before being sent.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// An extraction expression failed to compile or evaluate.
    #[error("expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// A subscription callback failed.
    #[error("callback error: {0}")]
    Callback(#[from] CallbackError),
}

impl Error {
    /// Returns `true` if the server rejected the credentials or token grant.
    #[must_use]
    pub fn is_authentication_failed(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::AuthenticationFailed))
    }

    /// Returns `true` if the failure is transient and the caller may retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Protocol(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Errors related to protocol communication (HTTP and realtime).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The HTTP client could not be built or a response body could not be read.
    #[error("HTTP client error: {0}")]
    Http(#[source] reqwest::Error),

    /// The API could not be reached.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The server rejected the credentials or the refresh token.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The server answered with a non-success HTTP status.
    #[error("request rejected with HTTP {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Reason phrase or response body.
        message: String,
    },

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// WebSocket transport failure.
    #[cfg(feature = "realtime")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// The realtime handshake did not complete.
    #[error("realtime handshake failed: {0}")]
    Handshake(String),

    /// The realtime connection was closed by the remote side or the network.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Operation timed out.
    #[error("timed out after {0} ms")]
    Timeout(u64),
}

impl ProtocolError {
    /// Returns `true` for connectivity failures that may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ServiceUnavailable(_) | Self::ConnectionClosed(_) | Self::Timeout(_) => true,
            #[cfg(feature = "realtime")]
            Self::WebSocket(_) => true,
            _ => false,
        }
    }

    /// Classifies a `reqwest` send error.
    ///
    /// Anything that prevented a response from arriving is reported as
    /// [`ProtocolError::ServiceUnavailable`].
    pub(crate) fn from_send(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::ServiceUnavailable(format!("request timed out: {err}"))
        } else {
            Self::ServiceUnavailable(err.to_string())
        }
    }
}

/// Errors related to response validation.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response did not match the expected schema.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Expected field is missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),

    /// A realtime packet could not be decoded.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),
}

/// Errors related to request values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A target temperature was supplied without its units.
    #[error("units must be supplied with temperature fields")]
    MissingUnits,

    /// A node type string is empty or contains a path separator.
    #[error("invalid node type: {0:?}")]
    InvalidNodeType(String),

    /// A node address could not be parsed.
    #[error("invalid node address: {0:?}")]
    InvalidAddress(String),

    /// An API name is not a known reseller and no basic-auth secret was given.
    #[error("unknown reseller API {0:?}; a basic auth secret is required")]
    UnknownReseller(String),
}

/// Errors produced by extraction expressions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    /// The expression could not be parsed.
    #[error("syntax error at {position}: {message}")]
    Syntax {
        /// Byte offset of the offending token.
        position: usize,
        /// Description of the problem.
        message: String,
    },

    /// The expression could not be applied to the input.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// A subscription path pattern is not a valid regular expression.
    #[error("invalid path pattern: {0}")]
    InvalidPattern(String),
}

/// A subscription callback failed while handling an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("subscription {subscription} failed: {message}")]
pub struct CallbackError {
    /// The subscription whose callback failed.
    pub subscription: SubscriptionId,
    /// Panic payload or failure description.
    pub message: String,
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::Rejected {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(err.to_string(), "request rejected with HTTP 404: Not Found");
    }

    #[test]
    fn authentication_failed_is_not_retryable() {
        let err: Error = ProtocolError::AuthenticationFailed.into();
        assert!(err.is_authentication_failed());
        assert!(!err.is_retryable());
    }

    #[test]
    fn service_unavailable_is_retryable() {
        let err: Error = ProtocolError::ServiceUnavailable("connection refused".into()).into();
        assert!(err.is_retryable());
        assert!(!err.is_authentication_failed());
    }

    #[test]
    fn expression_error_display() {
        let err = ExpressionError::Syntax {
            position: 3,
            message: "unexpected token".to_string(),
        };
        assert_eq!(err.to_string(), "syntax error at 3: unexpected token");
    }

    #[test]
    fn callback_error_display() {
        let err = CallbackError {
            subscription: SubscriptionId::new(7),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "subscription Sub(7) failed: boom");
    }

    #[test]
    fn malformed_response_wraps_into_error() {
        let err: Error = ParseError::MalformedResponse("missing devs".into()).into();
        assert!(matches!(
            err,
            Error::Parse(ParseError::MalformedResponse(_))
        ));
    }
}
