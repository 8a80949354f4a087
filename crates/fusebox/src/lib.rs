// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Circuit breakers for preventing cascading failures in a client application.
//!
//! A circuit breaker monitors the outcome of calls against a logical backend endpoint and
//! temporarily short-circuits further calls once the endpoint looks unhealthy, giving it time
//! to recover while the application serves fallback data instead of piling on errors.
//!
//! The primary types are:
//!
//! - [`CircuitBreaker`]: the per-endpoint state machine executing guarded operations.
//! - [`BreakerRegistry`]: a process-wide map handing out one breaker per endpoint name.
//! - [`Fallback`]: a tagged substitute value or producer used when an operation is skipped
//!   or fails.
//! - [`Fault`]: classifies errors into service faults (which trip the circuit) and caller
//!   faults (which never do).
//!
//! # Circuit breaker states and transitions
//!
//! ```text
//! ┌────────┐   consecutive service faults    ┌──────────┐
//! │ Closed │ ───────────────────────────────▶│   Open   │
//! └────────┘                                 └──────────┘
//!      ▲                                           │
//!      │          ┌────────────────┐               │
//!      └──────────│   Half-Open    │◀──────────────┘
//!     probing     └────────────────┘   reset timeout
//!     successful                       elapsed
//! ```
//!
//! - **Closed**: normal operation; consecutive service faults are counted and the circuit
//!   opens once they reach the configured threshold. Caller faults (for example HTTP 4xx)
//!   never count.
//! - **Open**: calls are rejected without reaching the operation; the fallback is served when
//!   one exists, otherwise the call fails with [`BreakerError::Open`]. The transition to
//!   half-open happens lazily on the next call after the reset timeout, not on a timer.
//! - **Half-Open**: calls run as probes. A configured number of consecutive probe successes
//!   closes the circuit; a single probe service fault reopens it immediately.
//!
//! # Quick start
//!
//! ```
//! use fusebox::{BreakerRegistry, Fallback, Fault};
//! use sundial::Clock;
//!
//! #[derive(Debug, Clone)]
//! struct Outage;
//!
//! impl std::fmt::Display for Outage {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         f.write_str("backend outage")
//!     }
//! }
//!
//! impl std::error::Error for Outage {}
//!
//! impl Fault for Outage {
//!     fn is_service_fault(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # futures::executor::block_on(async {
//! let clock = Clock::new();
//! let registry = BreakerRegistry::new(&clock);
//! let breaker = registry.get("products");
//!
//! let result = breaker
//!     .execute(
//!         || async { Err::<Vec<String>, _>(Outage) },
//!         Fallback::value(Vec::new()),
//!     )
//!     .await;
//!
//! // The operation failed, so the fallback was served instead.
//! assert_eq!(result.unwrap(), Vec::<String>::new());
//! # });
//! ```
//!
//! # Observability
//!
//! Every state transition and qualifying failure is published to listeners registered with
//! [`CircuitBreaker::subscribe`] (or registry-wide with [`BreakerRegistry::subscribe_all`]),
//! so a UI layer can surface transient "service degraded" notices. A panicking listener is
//! isolated: it never affects breaker state or the other listeners.

mod breaker;
mod engine;
mod error;
mod event;
mod fallback;
mod fault;
mod metrics;
mod name;
mod options;
mod registry;
mod state;

pub use breaker::CircuitBreaker;
pub use error::BreakerError;
pub use event::BreakerEvent;
pub use fallback::Fallback;
pub use fault::Fault;
pub use metrics::BreakerMetrics;
pub use name::BreakerName;
pub use options::BreakerOptions;
pub use registry::BreakerRegistry;
pub use state::CircuitState;
