// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::SystemTime;

use crate::CircuitState;

/// A point-in-time snapshot of a breaker's health counters.
///
/// Counters are lifetime totals, reset only by an explicit
/// [`reset`][crate::CircuitBreaker::reset] or
/// [`reset_all`][crate::BreakerRegistry::reset_all].
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerMetrics {
    /// The breaker's current state.
    pub state: CircuitState,

    /// Total operations the breaker has been asked to run, including rejected ones.
    pub total_requests: u64,

    /// Total service faults observed.
    pub total_failures: u64,

    /// Successful executions divided by executed operations.
    ///
    /// Reads `1.0` while nothing has executed yet, so a fresh breaker reports as healthy.
    pub success_rate: f64,

    /// Consecutive service faults observed while closed; zeroed on success.
    pub consecutive_failures: u32,

    /// When the breaker last changed state (or was created).
    pub last_transition_at: SystemTime,
}
