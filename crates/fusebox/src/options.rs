// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Configuration for a single circuit breaker instance.
///
/// Options are immutable once the breaker is constructed. The defaults suit a client-side
/// storefront talking to a remote backend:
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | Failure threshold | `5` | Consecutive service faults before the circuit opens |
/// | Reset timeout | `30s` | How long the circuit stays open before probing |
/// | Success threshold | `2` | Consecutive half-open probe successes required to close |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use fusebox::BreakerOptions;
///
/// let options = BreakerOptions::new()
///     .failure_threshold(3)
///     .reset_timeout(Duration::from_secs(60))
///     .success_threshold(2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerOptions {
    pub(crate) failure_threshold: u32,
    pub(crate) reset_timeout: Duration,
    pub(crate) success_threshold: u32,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

impl BreakerOptions {
    /// Creates options with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of consecutive service faults that trips the circuit.
    ///
    /// Clamped to a minimum of `1`.
    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets how long the circuit stays open before the next call probes the endpoint.
    #[must_use]
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Sets the number of consecutive half-open probe successes required to close.
    ///
    /// Clamped to a minimum of `1`.
    #[must_use]
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }
}
