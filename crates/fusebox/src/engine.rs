// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Instant, SystemTime};

use parking_lot::Mutex;
use sundial::Clock;

use crate::{BreakerMetrics, BreakerOptions, CircuitState};

/// Outcome of asking the engine to admit a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enter {
    /// Run the operation; `probe` is `true` during half-open probation.
    Proceed {
        /// Whether the call runs as a recovery probe.
        probe: bool,
    },
    /// Short-circuit the call; the reset timeout has not elapsed.
    Rejected,
}

/// Classified outcome of an executed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionResult {
    Success,
    ServiceFault,
    CallerFault,
}

/// A state transition to be published to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
    pub at: SystemTime,
}

/// Engine that manages the state of the circuit breaker.
#[derive(Debug)]
pub(crate) struct Engine {
    inner: Mutex<Inner>,
    options: BreakerOptions,
    clock: Clock,
}

#[derive(Debug)]
struct Inner {
    state: State,
    total_requests: u64,
    total_failures: u64,
    executed: u64,
    succeeded: u64,
    consecutive_failures: u32,
    last_transition_at: SystemTime,
}

#[derive(Debug)]
enum State {
    Closed,
    Open { open_until: Instant },
    HalfOpen { consecutive_successes: u32 },
}

impl State {
    const fn as_circuit_state(&self) -> CircuitState {
        match self {
            Self::Closed => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

impl Engine {
    pub fn new(options: BreakerOptions, clock: Clock) -> Self {
        let created_at = clock.system_time();
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed,
                total_requests: 0,
                total_failures: 0,
                executed: 0,
                succeeded: 0,
                consecutive_failures: 0,
                last_transition_at: created_at,
            }),
            options,
            clock,
        }
    }

    /// Admits or rejects a call, lazily moving an expired open circuit into half-open.
    pub fn enter(&self) -> (Enter, Option<Transition>) {
        // NOTE: Remember to execute all expensive operations (like time checks) outside the lock.
        let now = self.clock.instant();
        let wall = self.clock.system_time();

        let mut inner = self.inner.lock();
        inner.total_requests = inner.total_requests.saturating_add(1);

        match inner.state {
            State::Closed => (Enter::Proceed { probe: false }, None),
            State::Open { open_until } => {
                if now >= open_until {
                    let transition = inner.transition(State::HalfOpen { consecutive_successes: 0 }, wall);
                    (Enter::Proceed { probe: true }, Some(transition))
                } else {
                    (Enter::Rejected, None)
                }
            }
            State::HalfOpen { .. } => (Enter::Proceed { probe: true }, None),
        }
    }

    /// Records the classified result of an executed operation.
    pub fn exit(&self, result: ExecutionResult) -> Option<Transition> {
        let now = self.clock.instant();
        let wall = self.clock.system_time();

        let mut inner = self.inner.lock();
        inner.executed = inner.executed.saturating_add(1);

        match result {
            // Caller faults carry no signal about service health; they leave the state
            // machine untouched.
            ExecutionResult::CallerFault => None,
            ExecutionResult::Success => {
                inner.succeeded = inner.succeeded.saturating_add(1);
                match inner.state {
                    State::Closed => {
                        inner.consecutive_failures = 0;
                        None
                    }
                    State::HalfOpen { consecutive_successes } => {
                        let successes = consecutive_successes.saturating_add(1);
                        if successes >= self.options.success_threshold {
                            inner.consecutive_failures = 0;
                            Some(inner.transition(State::Closed, wall))
                        } else {
                            inner.state = State::HalfOpen {
                                consecutive_successes: successes,
                            };
                            None
                        }
                    }
                    // A result can arrive in the open state when the circuit changed between
                    // enter and exit. Ignore it.
                    State::Open { .. } => None,
                }
            }
            ExecutionResult::ServiceFault => {
                inner.total_failures = inner.total_failures.saturating_add(1);
                match inner.state {
                    State::Closed => {
                        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                        if inner.consecutive_failures >= self.options.failure_threshold {
                            let open_until = now + self.options.reset_timeout;
                            Some(inner.transition(State::Open { open_until }, wall))
                        } else {
                            None
                        }
                    }
                    // A single probe failure reopens immediately, no threshold.
                    State::HalfOpen { .. } => {
                        let open_until = now + self.options.reset_timeout;
                        Some(inner.transition(State::Open { open_until }, wall))
                    }
                    State::Open { .. } => None,
                }
            }
        }
    }

    /// Forces the breaker to closed with zeroed counters.
    pub fn reset(&self) -> Option<Transition> {
        let wall = self.clock.system_time();

        let mut inner = self.inner.lock();
        inner.total_requests = 0;
        inner.total_failures = 0;
        inner.executed = 0;
        inner.succeeded = 0;
        inner.consecutive_failures = 0;

        match inner.state {
            State::Closed => None,
            State::Open { .. } | State::HalfOpen { .. } => Some(inner.transition(State::Closed, wall)),
        }
    }

    /// Returns the current state without advancing lazy transitions.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state.as_circuit_state()
    }

    pub fn metrics(&self) -> BreakerMetrics {
        let inner = self.inner.lock();

        #[expect(clippy::cast_precision_loss, reason = "counters stay far below 2^52")]
        let success_rate = if inner.executed == 0 {
            1.0
        } else {
            inner.succeeded as f64 / inner.executed as f64
        };

        BreakerMetrics {
            state: inner.state.as_circuit_state(),
            total_requests: inner.total_requests,
            total_failures: inner.total_failures,
            success_rate,
            consecutive_failures: inner.consecutive_failures,
            last_transition_at: inner.last_transition_at,
        }
    }
}

impl Inner {
    fn transition(&mut self, next: State, at: SystemTime) -> Transition {
        let from = self.state.as_circuit_state();
        let to = next.as_circuit_state();
        self.state = next;
        self.last_transition_at = at;
        Transition { from, to, at }
    }
}
