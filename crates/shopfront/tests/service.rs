// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end tests: scripted backend responses driven through the full pipeline
//! (circuit breaker → deduplicator → transport) using only the public API.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use fusebox::CircuitState;
use http::{Request, Response};
use shopfront::{
    ApiClient, ApiConfig, ApiContext, ApiError, CartLine, CartView, Credentials, NoticeKind, OrderDraft, Product,
    ProductFilter, Transport, TransportError, catalog,
};
use sundial::ClockControl;
use tokio::sync::Notify;

const RESET_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
enum Scripted {
    Status(u16, String),
    Timeout,
    NetworkDown,
}

/// A transport that replays a fixed script; running past the script's end is a test
/// failure, which is how "this call never reached the network" is proven.
struct ScriptedTransport {
    script: parking_lot::Mutex<VecDeque<Scripted>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: parking_lot::Mutex::new(script.into()),
            gate: None,
        }
    }

    fn gated(script: Vec<Scripted>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(script)
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        _request: Request<Bytes>,
        _timeout: Duration,
    ) -> impl std::future::Future<Output = Result<Response<Bytes>, TransportError>> + Send {
        let next = self.script.lock().pop_front();
        let gate = self.gate.clone();

        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            match next.expect("transport script exhausted") {
                Scripted::Status(code, body) => Ok(Response::builder()
                    .status(code)
                    .body(Bytes::from(body))
                    .expect("valid scripted response")),
                Scripted::Timeout => Err(TransportError::Timeout),
                Scripted::NetworkDown => Err(TransportError::Network("connection refused".to_string())),
            }
        }
    }
}

fn config() -> ApiConfig {
    ApiConfig {
        breaker_failure_threshold: 3,
        breaker_reset_timeout: RESET_TIMEOUT,
        ..ApiConfig::default()
    }
}

fn client(script: Vec<Scripted>) -> (ApiClient<ScriptedTransport>, ClockControl) {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let context = ApiContext::new(config(), &clock);
    (ApiClient::new(ScriptedTransport::new(script), context), control)
}

fn ok(body: &impl serde::Serialize) -> Scripted {
    Scripted::Status(200, serde_json::to_string(body).expect("serializable body"))
}

fn live_featured() -> Vec<Product> {
    vec![Product {
        id: "live-1".to_string(),
        name: "Live Featured Parka".to_string(),
        category: "coats".to_string(),
        price_cents: 21_000,
        variants: Vec::new(),
        featured: true,
    }]
}

fn sample_cart(user_id: &str) -> CartView {
    CartView {
        user_id: user_id.to_string(),
        lines: vec![CartLine {
            product_id: "7".to_string(),
            variant_id: "7-blue".to_string(),
            quantity: 1,
        }],
    }
}

// Scenario: the backend returns 503 three times (threshold 3); the fourth call must not
// reach the network and serves the bundled static product with the circuit open.
#[tokio::test]
async fn repeated_server_errors_trip_the_circuit_and_serve_bundled_data() {
    let (client, _control) = client(vec![
        Scripted::Status(503, String::new()),
        Scripted::Status(503, String::new()),
        Scripted::Status(503, String::new()),
    ]);

    let bundled = catalog::product_by_id("42").cloned();
    for _ in 0..4 {
        let found = client.product_by_id("42").await.expect("query degrades, never errors");
        assert_eq!(found, bundled);
    }

    let failures = client.context().breakers().get("products").metrics().total_failures;
    assert_eq!(failures, 3);
    assert_eq!(client.context().breakers().get("products").state(), CircuitState::Open);
}

// Scenario: two widgets request the featured rail simultaneously; exactly one network
// request is observed and both render the same list.
#[tokio::test]
async fn simultaneous_featured_queries_share_one_network_call() {
    let gate = Arc::new(Notify::new());
    let control = ClockControl::new();
    let clock = control.to_clock();
    let context = ApiContext::new(config(), &clock);
    let client = ApiClient::new(
        ScriptedTransport::gated(vec![ok(&live_featured())], Arc::clone(&gate)),
        context,
    );

    let opener = async {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        gate.notify_waiters();
    };
    let (first, second, ()) = futures::join!(client.featured_products(), client.featured_products(), opener);

    let first = first.expect("query succeeds");
    let second = second.expect("query succeeds");
    assert_eq!(first, live_featured());
    assert_eq!(first, second);

    // Only the shared leader reached the transport.
    let breaker = client.context().breakers().get("products");
    assert_eq!(breaker.metrics().total_requests, 2);
    assert_eq!(breaker.metrics().total_failures, 0);
}

// Scenario: tab-wide cart mutation invalidates the deduplicated cart reads.
#[tokio::test]
async fn cart_mutation_invalidates_cached_cart_reads() {
    let updated = CartView {
        user_id: "u1".to_string(),
        lines: vec![
            CartLine {
                product_id: "7".to_string(),
                variant_id: "7-blue".to_string(),
                quantity: 1,
            },
            CartLine {
                product_id: "9".to_string(),
                variant_id: "9-red".to_string(),
                quantity: 1,
            },
        ],
    };
    let (client, _control) = client(vec![ok(&sample_cart("u1")), ok(&updated), ok(&updated)]);

    assert_eq!(client.cart("u1").await.unwrap(), sample_cart("u1"));
    // Within the response-cache TTL the repeat is served without a network call.
    assert_eq!(client.cart("u1").await.unwrap(), sample_cart("u1"));

    let line = CartLine {
        product_id: "9".to_string(),
        variant_id: "9-red".to_string(),
        quantity: 1,
    };
    assert_eq!(client.add_to_cart("u1", &line).await.unwrap(), updated);

    // The mutation dropped the cached read; this refetches.
    assert_eq!(client.cart("u1").await.unwrap(), updated);
}

#[tokio::test]
async fn cart_reads_fall_back_to_last_known_good_when_the_backend_degrades() {
    let (client, control) = client(vec![
        ok(&sample_cart("u1")),
        Scripted::Status(503, String::new()),
        Scripted::Status(503, String::new()),
        Scripted::Status(503, String::new()),
    ]);

    assert_eq!(client.cart("u1").await.unwrap(), sample_cart("u1"));

    // Step past the response-cache TTL but stay inside the fallback cache's 5 minutes.
    control.advance(Duration::from_secs(150));

    // Three failing calls serve the last known good cart and trip the circuit.
    for _ in 0..3 {
        assert_eq!(client.cart("u1").await.unwrap(), sample_cart("u1"));
    }
    assert_eq!(client.context().breakers().get("cart").state(), CircuitState::Open);

    // The open circuit still serves the cached copy without any network traffic.
    assert_eq!(client.cart("u1").await.unwrap(), sample_cart("u1"));
}

#[tokio::test]
async fn client_errors_propagate_and_never_trip() {
    let script = (0..5)
        .map(|_| Scripted::Status(401, "invalid credentials".to_string()))
        .collect();
    let (client, _control) = client(script);

    let credentials = Credentials {
        email: "shopper@example.com".to_string(),
        password: "wrong".to_string(),
    };

    for _ in 0..5 {
        let failure = client.login(&credentials).await.expect_err("login must surface 401");
        assert!(matches!(failure, ApiError::Client { status: 401, endpoint: "auth", .. }));
    }

    assert_eq!(client.context().breakers().get("auth").state(), CircuitState::Closed);
}

#[tokio::test]
async fn order_placement_never_gets_a_fallback() {
    let (client, _control) = client(vec![
        Scripted::Status(503, String::new()),
        Scripted::Status(503, String::new()),
        Scripted::Status(503, String::new()),
    ]);

    let draft = OrderDraft {
        user_id: "u1".to_string(),
        lines: sample_cart("u1").lines,
        total_cents: 18_900,
    };

    // Three failed submissions trip the orders circuit; every failure surfaced.
    for _ in 0..3 {
        let failure = client.create_order(&draft).await.expect_err("mutations must not be faked");
        assert!(matches!(failure, ApiError::Server { status: 503, endpoint: "orders" }));
    }

    // With the circuit open the rejection is immediate and explicit.
    let rejected = client.create_order(&draft).await.expect_err("open circuit must surface");
    assert_eq!(rejected, ApiError::Unavailable { endpoint: "orders" });

    // A critical endpoint is down: the application reports degraded mode.
    assert!(client.context().service_health().degraded);
}

#[tokio::test]
async fn fallback_priority_prefers_bundled_data_over_the_cache() {
    let (client, _control) = client(vec![Scripted::Status(503, String::new())]);

    // Poison the fallback cache with a different payload for a bundled product.
    let mut stale = catalog::product_by_id("42").cloned().unwrap();
    stale.name = "Stale Cached Name".to_string();
    client
        .context()
        .fallback_cache()
        .put("product:42".to_string(), serde_json::to_value(&stale).unwrap());

    let found = client.product_by_id("42").await.unwrap().unwrap();
    assert_eq!(found.name, "Quilted Liner Jacket");
}

#[tokio::test]
async fn unknown_products_fall_back_to_the_cache_then_to_none() {
    let cached = Product {
        id: "999".to_string(),
        name: "Archive Runway Coat".to_string(),
        category: "coats".to_string(),
        price_cents: 99_000,
        variants: Vec::new(),
        featured: false,
    };
    let (client, _control) = client(vec![
        Scripted::Status(503, String::new()),
        Scripted::Status(503, String::new()),
    ]);

    // Not bundled, but present in the fallback cache: the cache serves it.
    client
        .context()
        .fallback_cache()
        .put("product:999".to_string(), serde_json::to_value(&cached).unwrap());
    assert_eq!(client.product_by_id("999").await.unwrap(), Some(cached));

    // Not bundled and not cached: the query degrades to None.
    assert_eq!(client.product_by_id("777").await.unwrap(), None);
}

#[tokio::test]
async fn timeouts_count_toward_tripping() {
    let (client, _control) = client(vec![Scripted::Timeout, Scripted::NetworkDown, Scripted::Timeout]);

    for _ in 0..3 {
        // The bundled featured rail keeps the UI alive through every failure.
        assert_eq!(client.featured_products().await.unwrap(), catalog::featured());
    }

    let breaker = client.context().breakers().get("products");
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.metrics().total_failures, 3);
}

#[tokio::test]
async fn recovery_closes_the_circuit_and_notifies() {
    let (client, control) = client(vec![
        Scripted::Status(503, String::new()),
        Scripted::Status(503, String::new()),
        Scripted::Status(503, String::new()),
        ok(&live_featured()),
        ok(&live_featured()),
    ]);

    for _ in 0..3 {
        let _ = client.featured_products().await;
    }
    assert_eq!(client.context().breakers().get("products").state(), CircuitState::Open);

    // Past the reset timeout, two successful probes close the circuit again. The second
    // probe waits out the response-cache TTL so it actually exercises the network.
    control.advance(RESET_TIMEOUT + Duration::from_secs(1));
    assert_eq!(client.featured_products().await.unwrap(), live_featured());
    control.advance(Duration::from_secs(301));
    assert_eq!(client.featured_products().await.unwrap(), live_featured());

    assert_eq!(client.context().breakers().get("products").state(), CircuitState::Closed);

    let notices = client.context().take_notices();
    assert!(notices.iter().any(|notice| notice.kind == NoticeKind::Degraded));
    assert!(notices.iter().any(|notice| notice.kind == NoticeKind::Recovered));
}

#[tokio::test]
async fn degraded_queries_resolve_empty_rather_than_crashing() {
    // No bundled fallback exists for order history and nothing is cached.
    let (client, _control) = client(vec![Scripted::NetworkDown]);

    let history = client.orders("u1").await.expect("history degrades to empty");
    assert!(history.is_empty());
}

#[tokio::test]
async fn products_filter_reaches_the_backend_and_falls_back_filtered() {
    let (client, _control) = client(vec![Scripted::Status(503, String::new())]);

    let filter = ProductFilter {
        category: Some("denim".to_string()),
        search: None,
    };
    let products = client.products(&filter).await.unwrap();

    // The bundled fallback respects the filter.
    assert!(!products.is_empty());
    assert!(products.iter().all(|product| product.category == "denim"));
}
