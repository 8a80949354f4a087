// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Provides an abstraction for time-related operations.
///
/// Cloning a clock is inexpensive and every clone shares the same underlying state. When the
/// `test-util` feature is enabled, clocks created from a [`ClockControl`][crate::ClockControl]
/// observe the controlled passage of time through every clone.
///
/// # Relative and absolute time
///
/// - [`instant`][Self::instant] returns monotonic relative time, suitable for measuring
///   elapsed durations (circuit reset timeouts, cache TTLs, debounce windows).
/// - [`system_time`][Self::system_time] and [`epoch_millis`][Self::epoch_millis] return
///   absolute wall-clock time, suitable for values that cross process boundaries (cart
///   snapshot timestamps, checkout lock acquisition times).
///
/// # Examples
///
/// ```
/// use sundial::Clock;
///
/// let clock = Clock::new();
/// let started = clock.instant();
/// let elapsed = clock.instant() - started;
/// assert!(elapsed < std::time::Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    source: Source,
}

#[derive(Debug, Clone)]
enum Source {
    System,

    #[cfg(feature = "test-util")]
    Controlled(std::sync::Arc<crate::clock_control::ControlState>),
}

impl Clock {
    /// Creates a clock that follows the system time.
    #[must_use]
    pub const fn new() -> Self {
        Self { source: Source::System }
    }

    /// Creates a clock whose time only moves when explicitly advanced.
    ///
    /// This is a convenience for tests that never need to advance time; use
    /// [`ClockControl`][crate::ClockControl] when the test must move the clock forward.
    #[cfg(feature = "test-util")]
    #[must_use]
    pub fn new_frozen() -> Self {
        crate::ClockControl::new().to_clock()
    }

    #[cfg(feature = "test-util")]
    pub(crate) fn controlled(state: std::sync::Arc<crate::clock_control::ControlState>) -> Self {
        Self {
            source: Source::Controlled(state),
        }
    }

    /// Returns the current monotonic time.
    #[must_use]
    pub fn instant(&self) -> Instant {
        match &self.source {
            Source::System => Instant::now(),

            #[cfg(feature = "test-util")]
            Source::Controlled(state) => state.instant(),
        }
    }

    /// Returns the current absolute time in UTC.
    ///
    /// Controlled clocks start at the UNIX epoch.
    #[must_use]
    pub fn system_time(&self) -> SystemTime {
        match &self.source {
            Source::System => SystemTime::now(),

            #[cfg(feature = "test-util")]
            Source::Controlled(state) => state.system_time(),
        }
    }

    /// Returns the current absolute time as milliseconds since the UNIX epoch.
    ///
    /// Saturates to zero if the system clock reads before the epoch.
    #[must_use]
    pub fn epoch_millis(&self) -> u64 {
        let since_epoch = self
            .system_time()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);

        u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
