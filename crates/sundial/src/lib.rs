// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Time primitives for components that must be testable without waiting.
//!
//! Working with time is notoriously difficult to test. Every time-dependent component in this
//! workspace (circuit breakers, TTL caches, debounce windows, stale locks) reads time through a
//! [`Clock`] handle instead of calling [`std::time::Instant::now`] directly. In production the
//! clock follows the machine; in tests the `test-util` feature exposes [`ClockControl`], which
//! freezes time and lets tests jump forward instantly.
//!
//! # Examples
//!
//! ```
//! use sundial::Clock;
//!
//! let clock = Clock::new();
//! let earlier = clock.instant();
//! assert!(clock.instant() >= earlier);
//! ```
//!
//! Controlling time in tests:
//!
//! ```
//! # #[cfg(feature = "test-util")]
//! # {
//! use std::time::Duration;
//!
//! use sundial::ClockControl;
//!
//! let control = ClockControl::new();
//! let clock = control.to_clock();
//!
//! let start = clock.instant();
//! control.advance(Duration::from_secs(300));
//! assert_eq!(clock.instant() - start, Duration::from_secs(300));
//! # }
//! ```
//!
//! # Production code and `ClockControl`
//!
//! Never enable the `test-util` feature in production code. Always ensure it is only enabled
//! through `dev-dependencies`:
//!
//! ```toml
//! sundial = { version = "*", features = ["test-util"] }
//! ```

mod clock;
#[cfg(feature = "test-util")]
mod clock_control;

pub use clock::Clock;
#[cfg(feature = "test-util")]
pub use clock_control::ClockControl;
