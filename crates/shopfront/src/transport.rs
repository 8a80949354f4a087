// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request, Response, header};

use crate::error::ApiError;

/// A transport-level failure, before any HTTP status exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// The request never completed (DNS, connection reset, offline).
    #[error("network failure: {0}")]
    Network(String),
}

/// The seam between the service layer and whatever actually speaks HTTP.
///
/// The host application supplies the implementation — a fetch binding, a `hyper` or
/// `reqwest` wrapper — while tests script responses. Implementations must honor `timeout`:
/// exceeding it resolves to [`TransportError::Timeout`], which the circuit breaker counts
/// as a qualifying failure.
pub trait Transport: Send + Sync {
    /// Sends `request`, resolving within `timeout`.
    fn send(
        &self,
        request: Request<Bytes>,
        timeout: Duration,
    ) -> impl Future<Output = Result<Response<Bytes>, TransportError>> + Send;
}

/// A transport that refuses every request.
///
/// Useful with [`DataMode::Local`][crate::DataMode::Local], where operations never reach
/// the network, and in tests exercising pure fallback paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(
        &self,
        _request: Request<Bytes>,
        _timeout: Duration,
    ) -> impl Future<Output = Result<Response<Bytes>, TransportError>> + Send {
        std::future::ready(Err(TransportError::Network("no transport configured".to_string())))
    }
}

/// Builds a JSON request against `url`.
pub(crate) fn json_request(
    method: Method,
    url: &str,
    body: Option<&serde_json::Value>,
    endpoint: &'static str,
) -> Result<Request<Bytes>, ApiError> {
    let mut builder = Request::builder()
        .method(method)
        .uri(url)
        .header(header::ACCEPT, "application/json");

    let payload = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Bytes::from(value.to_string())
        }
        None => Bytes::new(),
    };

    builder.body(payload).map_err(|error| ApiError::Network {
        endpoint,
        detail: format!("invalid request: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_requests_carry_content_type_only_with_a_body() {
        let with_body = json_request(
            Method::POST,
            "https://store.example.com/api/orders",
            Some(&serde_json::json!({"total_cents": 100})),
            "orders",
        )
        .unwrap();
        assert_eq!(
            with_body.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert!(!with_body.body().is_empty());

        let without_body = json_request(Method::GET, "https://store.example.com/api/products", None, "products").unwrap();
        assert!(without_body.headers().get(header::CONTENT_TYPE).is_none());
        assert!(without_body.body().is_empty());
    }

    #[test]
    fn malformed_urls_surface_as_network_errors() {
        let result = json_request(Method::GET, "http://exa mple.com", None, "products");
        assert!(matches!(result, Err(ApiError::Network { endpoint: "products", .. })));
    }
}
