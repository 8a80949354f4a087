// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use fusebox::{BreakerError, Fault};
use http::StatusCode;

/// The user-facing error surface of every storefront operation.
///
/// Variants carry the coarse endpoint name (and the HTTP status where one exists) so the
/// UI and logs can attribute a failure without stack-walking. The enum is `Clone` because
/// a single failed deduplicated execution fans out to every collapsed caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// HTTP 4xx: the request itself was wrong (validation, auth, missing resource).
    /// Never trips a circuit and always propagates unmodified.
    #[error("{endpoint}: rejected request (http {status}): {message}")]
    Client {
        /// The HTTP status code.
        status: u16,
        /// The logical endpoint that rejected the request.
        endpoint: &'static str,
        /// Human-readable detail from the response body.
        message: String,
    },

    /// HTTP 5xx: the service is experiencing issues; try again later.
    #[error("{endpoint}: service is experiencing issues (http {status}), try again")]
    Server {
        /// The HTTP status code.
        status: u16,
        /// The logical endpoint that failed.
        endpoint: &'static str,
    },

    /// The request exceeded its deadline; check the connection.
    #[error("{endpoint}: request timed out, check your connection")]
    Timeout {
        /// The logical endpoint that timed out.
        endpoint: &'static str,
    },

    /// The request never completed at the transport level.
    #[error("{endpoint}: network failure: {detail}")]
    Network {
        /// The logical endpoint that was unreachable.
        endpoint: &'static str,
        /// Transport-level detail.
        detail: String,
    },

    /// The endpoint's circuit is open and no fallback data was available.
    #[error("{endpoint}: service temporarily unavailable")]
    Unavailable {
        /// The logical endpoint whose circuit is open.
        endpoint: &'static str,
    },

    /// The response arrived but did not decode as the expected shape.
    #[error("{endpoint}: malformed response payload")]
    Decode {
        /// The logical endpoint that produced the payload.
        endpoint: &'static str,
    },
}

impl ApiError {
    /// Returns the logical endpoint the error is attributed to.
    #[must_use]
    pub const fn endpoint(&self) -> &'static str {
        match self {
            Self::Client { endpoint, .. }
            | Self::Server { endpoint, .. }
            | Self::Timeout { endpoint }
            | Self::Network { endpoint, .. }
            | Self::Unavailable { endpoint }
            | Self::Decode { endpoint } => endpoint,
        }
    }

    /// Returns the underlying HTTP status, where one exists.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Fault for ApiError {
    fn is_service_fault(&self) -> bool {
        match self {
            Self::Client { .. } => false,
            Self::Server { .. } | Self::Timeout { .. } | Self::Network { .. } | Self::Unavailable { .. } | Self::Decode { .. } => {
                true
            }
        }
    }
}

/// Classifies an HTTP status into an error, or `None` for success.
pub(crate) fn error_for_status(status: StatusCode, endpoint: &'static str, body: &[u8]) -> Option<ApiError> {
    if status.is_success() {
        return None;
    }
    if status.is_client_error() {
        return Some(ApiError::Client {
            status: status.as_u16(),
            endpoint,
            message: String::from_utf8_lossy(body).into_owned(),
        });
    }
    Some(ApiError::Server {
        status: status.as_u16(),
        endpoint,
    })
}

/// Flattens a breaker rejection into the endpoint-attributed error shape.
pub(crate) fn from_breaker(error: BreakerError<ApiError>, endpoint: &'static str) -> ApiError {
    match error {
        BreakerError::Open { .. } => ApiError::Unavailable { endpoint },
        BreakerError::Inner(inner) => inner,
    }
}
