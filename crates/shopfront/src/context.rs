// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use coalesce::{DedupOptions, Deduplicator};
use fusebox::{BreakerEvent, BreakerName, BreakerRegistry, CircuitState};
use larder::Larder;
use parking_lot::Mutex;
use sundial::Clock;

use crate::config::{ApiConfig, endpoints};
use crate::error::ApiError;

/// Endpoints whose outage alone puts the whole application into degraded mode.
const CRITICAL_ENDPOINTS: [&str; 2] = [endpoints::AUTH, endpoints::ORDERS];

/// The kind of availability change a notice reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// An endpoint's circuit opened; the UI is serving fallback data.
    Degraded,

    /// An endpoint's circuit closed again.
    Recovered,
}

/// A transient, user-facing availability notice derived from circuit breaker events.
///
/// Meant for toasts ("Service temporarily unavailable — using cached data"), not for
/// blocking error screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityNotice {
    /// The endpoint whose availability changed.
    pub endpoint: String,

    /// Whether the endpoint degraded or recovered.
    pub kind: NoticeKind,

    /// Suggested user-facing message.
    pub message: String,

    /// When the change happened.
    pub at: SystemTime,
}

/// Aggregate availability derived from every circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHealth {
    /// `true` when the application should gate optional affordances.
    ///
    /// Degraded means at least two circuits are open, or any critical endpoint
    /// (`auth`, `orders`) is open.
    pub degraded: bool,

    /// The endpoints whose circuits are currently open.
    pub open_circuits: Vec<BreakerName>,
}

/// Owns the shared resilience state of one storefront client.
///
/// The context replaces the ambient singletons a browser implementation would use: it is
/// constructed explicitly, passed to whatever owns the API client, and dropped with it —
/// which keeps breaker and cache lifecycles visible and avoids cross-test leakage.
pub struct ApiContext {
    pub(crate) config: ApiConfig,
    pub(crate) registry: BreakerRegistry,
    pub(crate) dedup: Deduplicator<Bytes, ApiError>,
    pub(crate) larder: Larder<serde_json::Value>,
    pub(crate) clock: Clock,
    notices: Arc<Mutex<Vec<AvailabilityNotice>>>,
}

impl ApiContext {
    /// Creates a context and wires breaker events into availability notices.
    #[must_use]
    pub fn new(config: ApiConfig, clock: &Clock) -> Self {
        let registry = BreakerRegistry::with_defaults(config.breaker_options(), clock);
        let notices: Arc<Mutex<Vec<AvailabilityNotice>>> = Arc::default();

        let sink = Arc::clone(&notices);
        registry.subscribe_all(move |event| {
            if let BreakerEvent::StateChange { name, to, at, .. } = event {
                let notice = match to {
                    CircuitState::Open => AvailabilityNotice {
                        endpoint: name.to_string(),
                        kind: NoticeKind::Degraded,
                        message: format!("{name} is temporarily unavailable — showing cached data"),
                        at: *at,
                    },
                    CircuitState::Closed => AvailabilityNotice {
                        endpoint: name.to_string(),
                        kind: NoticeKind::Recovered,
                        message: format!("{name} has recovered"),
                        at: *at,
                    },
                    CircuitState::HalfOpen => return,
                };
                sink.lock().push(notice);
            }
        });

        Self {
            config,
            registry,
            dedup: Deduplicator::new(DedupOptions::default(), clock).with_weigher(|payload: &Bytes| payload.len()),
            larder: Larder::new(clock),
            clock: clock.clone(),
            notices,
        }
    }

    /// Returns the configuration the context was built with.
    #[must_use]
    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Returns the per-endpoint circuit breaker registry.
    #[must_use]
    pub const fn breakers(&self) -> &BreakerRegistry {
        &self.registry
    }

    /// Returns the request deduplicator.
    #[must_use]
    pub const fn dedup(&self) -> &Deduplicator<Bytes, ApiError> {
        &self.dedup
    }

    /// Returns the fallback cache of last-known-good payloads.
    #[must_use]
    pub const fn fallback_cache(&self) -> &Larder<serde_json::Value> {
        &self.larder
    }

    /// Returns the clock driving every TTL and reset timeout in this context.
    ///
    /// Hosts should derive any sibling time-dependent state (for example cart
    /// synchronization) from the same clock so tests can control all of it at once.
    #[must_use]
    pub const fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Drains the availability notices accumulated since the last call.
    pub fn take_notices(&self) -> Vec<AvailabilityNotice> {
        std::mem::take(&mut *self.notices.lock())
    }

    /// Computes aggregate availability from every breaker's state.
    #[must_use]
    pub fn service_health(&self) -> ServiceHealth {
        let open_circuits: Vec<BreakerName> = self
            .registry
            .all_metrics()
            .into_iter()
            .filter(|(_, metrics)| metrics.state == CircuitState::Open)
            .map(|(name, _)| name)
            .collect();

        let critical_open = open_circuits
            .iter()
            .any(|name| CRITICAL_ENDPOINTS.contains(&name.as_str()));

        ServiceHealth {
            degraded: open_circuits.len() >= 2 || critical_open,
            open_circuits,
        }
    }

    /// Looks up a typed payload in the fallback cache.
    pub(crate) fn cached<P: serde::de::DeserializeOwned>(&self, key: &str) -> Option<P> {
        self.larder.get(key).and_then(|value| serde_json::from_value(value).ok())
    }

    /// Remembers a typed payload in the fallback cache.
    pub(crate) fn remember<P: serde::Serialize>(&self, key: &str, payload: &P) {
        if let Ok(value) = serde_json::to_value(payload) {
            self.larder.put(key, value);
        }
    }
}

impl Debug for ApiContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiContext")
            .field("config", &self.config)
            .field("breakers", &self.registry.len())
            .finish_non_exhaustive()
    }
}
