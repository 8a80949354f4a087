// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use sundial::Clock;

use crate::engine::{Engine, Enter, ExecutionResult, Transition};
use crate::{BreakerError, BreakerEvent, BreakerMetrics, BreakerName, BreakerOptions, CircuitState, Fallback, Fault};

type Listener = Arc<dyn Fn(&BreakerEvent) + Send + Sync>;

/// A per-endpoint failure-tracking state machine guarding calls against a backend.
///
/// Breakers are usually obtained from a [`BreakerRegistry`][crate::BreakerRegistry] rather
/// than constructed directly, so that every part of the application shares one instance per
/// endpoint. A breaker lives for the process lifetime; it recovers automatically through the
/// open → half-open → closed cycle, or immediately via [`reset`][Self::reset].
///
/// See the [crate documentation][crate] for the state machine and a usage example.
pub struct CircuitBreaker {
    name: BreakerName,
    engine: Engine,
    clock: Clock,
    listeners: RwLock<Vec<Listener>>,
}

impl CircuitBreaker {
    /// Creates a breaker with the given name and options.
    #[must_use]
    pub fn new(name: impl Into<BreakerName>, options: BreakerOptions, clock: &Clock) -> Self {
        Self {
            name: name.into(),
            engine: Engine::new(options, clock.clone()),
            clock: clock.clone(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Returns the breaker's name.
    #[must_use]
    pub const fn name(&self) -> &BreakerName {
        &self.name
    }

    /// Returns the breaker's current state.
    ///
    /// The open → half-open transition is lazy: an open breaker whose reset timeout has
    /// elapsed keeps reporting [`CircuitState::Open`] until the next call probes it.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.engine.state()
    }

    /// Returns a snapshot of the breaker's counters.
    #[must_use]
    pub fn metrics(&self) -> BreakerMetrics {
        self.engine.metrics()
    }

    /// Registers a listener for [`BreakerEvent`]s.
    ///
    /// Listeners are invoked synchronously from the call that caused the event. A panicking
    /// listener is caught and logged; it never affects breaker state or other listeners.
    pub fn subscribe(&self, listener: impl Fn(&BreakerEvent) + Send + Sync + 'static) {
        self.subscribe_shared(Arc::new(listener));
    }

    pub(crate) fn subscribe_shared(&self, listener: Listener) {
        self.listeners.write().push(listener);
    }

    /// Forces the breaker to closed with zeroed counters.
    ///
    /// Safe to call while operations are in flight: they complete under whatever state they
    /// observed when admitted, and their results are recorded against the fresh state.
    pub fn reset(&self) {
        if let Some(transition) = self.engine.reset() {
            self.publish_transition(transition);
        }
    }

    /// Runs `operation` under the breaker's protection.
    ///
    /// - **Closed**: the operation runs. A service fault increments the consecutive-failure
    ///   counter (possibly tripping the circuit) and is replaced by `fallback` when one was
    ///   supplied; with no fallback the error propagates. Caller faults always propagate
    ///   unmodified, fallback or not.
    /// - **Open**: before the reset timeout elapses the operation never runs; the fallback
    ///   is served, or [`BreakerError::Open`] is returned when there is none. Once the
    ///   timeout has elapsed the call proceeds as a half-open probe.
    /// - **Half-open**: the operation runs as a probe. Enough consecutive successes close
    ///   the circuit; a single service fault reopens it immediately.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] for a rejected call with no fallback, or
    /// [`BreakerError::Inner`] when the operation failed and no fallback applied.
    pub async fn execute<T, E, F, Fut>(&self, operation: F, fallback: Fallback<T>) -> Result<T, BreakerError<E>>
    where
        E: Fault,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (enter, transition) = self.engine.enter();
        if let Some(transition) = transition {
            self.publish_transition(transition);
        }

        match enter {
            Enter::Rejected => match fallback.produce().await {
                Some(value) => {
                    tracing::debug!(breaker = %self.name, "circuit open; serving fallback");
                    Ok(value)
                }
                None => Err(BreakerError::Open { name: self.name.clone() }),
            },
            Enter::Proceed { probe } => {
                if probe {
                    tracing::debug!(breaker = %self.name, "probing for recovery");
                }

                match operation().await {
                    Ok(value) => {
                        if let Some(transition) = self.engine.exit(ExecutionResult::Success) {
                            self.publish_transition(transition);
                        }
                        Ok(value)
                    }
                    Err(error) if error.is_service_fault() => {
                        let transition = self.engine.exit(ExecutionResult::ServiceFault);
                        self.publish(&BreakerEvent::Failure {
                            name: self.name.clone(),
                            state: self.engine.state(),
                            at: self.clock.system_time(),
                        });
                        if let Some(transition) = transition {
                            self.publish_transition(transition);
                        }

                        match fallback.produce().await {
                            Some(value) => Ok(value),
                            None => Err(BreakerError::Inner(error)),
                        }
                    }
                    Err(error) => {
                        // Caller fault: no health signal, no fallback substitution.
                        let _ = self.engine.exit(ExecutionResult::CallerFault);
                        Err(BreakerError::Inner(error))
                    }
                }
            }
        }
    }

    fn publish_transition(&self, transition: Transition) {
        tracing::info!(
            breaker = %self.name,
            from = %transition.from,
            to = %transition.to,
            "circuit state change"
        );
        self.publish(&BreakerEvent::StateChange {
            name: self.name.clone(),
            from: transition.from,
            to: transition.to,
            at: transition.at,
        });
    }

    fn publish(&self, event: &BreakerEvent) {
        let listeners = self.listeners.read();
        for listener in listeners.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(breaker = %self.name, "breaker listener panicked; ignored");
            }
        }
    }
}

impl Debug for CircuitBreaker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.engine.state())
            .finish_non_exhaustive()
    }
}
