// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::Clock;

/// Controls the flow of time in tests.
///
/// Clocks created via [`to_clock`][Self::to_clock] start at the UNIX epoch and only move when
/// [`advance`][Self::advance] is called. All clocks created from the same control (and all of
/// their clones) observe the same time.
///
/// `ClockControl` is available when the `test-util` feature is enabled.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use sundial::ClockControl;
///
/// let control = ClockControl::new();
/// let clock = control.to_clock();
///
/// let start = clock.instant();
/// control.advance(Duration::from_secs(1));
/// assert_eq!(clock.instant() - start, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClockControl {
    state: Arc<ControlState>,
}

impl ClockControl {
    /// Creates a new `ClockControl` with the initial time set to the UNIX epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward by `duration` for every clock created from this control.
    pub fn advance(&self, duration: Duration) {
        let mut offset = self.state.offset.lock();
        *offset += duration;
    }

    /// Creates a [`Clock`] driven by this control.
    #[must_use]
    pub fn to_clock(&self) -> Clock {
        Clock::controlled(Arc::clone(&self.state))
    }
}

/// Shared state between a control and every clock created from it.
#[derive(Debug)]
pub(crate) struct ControlState {
    anchor: Instant,
    offset: Mutex<Duration>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            anchor: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }
}

impl ControlState {
    pub(crate) fn instant(&self) -> Instant {
        self.anchor + *self.offset.lock()
    }

    pub(crate) fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + *self.offset.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_all_clones() {
        let control = ClockControl::new();
        let clock_a = control.to_clock();
        let clock_b = clock_a.clone();

        let start = clock_a.instant();
        control.advance(Duration::from_millis(250));

        assert_eq!(clock_a.instant() - start, Duration::from_millis(250));
        assert_eq!(clock_b.instant(), clock_a.instant());
    }

    #[test]
    fn system_time_starts_at_epoch() {
        let control = ClockControl::new();
        let clock = control.to_clock();

        assert_eq!(clock.system_time(), UNIX_EPOCH);
        assert_eq!(clock.epoch_millis(), 0);

        control.advance(Duration::from_secs(90));
        assert_eq!(clock.epoch_millis(), 90_000);
    }

    #[test]
    fn separate_controls_are_independent() {
        let control_a = ClockControl::new();
        let control_b = ClockControl::new();
        let clock_b = control_b.to_clock();

        let before = clock_b.instant();
        control_a.advance(Duration::from_secs(10));

        assert_eq!(clock_b.instant(), before);
    }
}
