// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::SystemTime;

use crate::{BreakerName, CircuitState};

/// A notification published to breaker listeners.
///
/// Events are delivered synchronously from the call that caused them. They are intended for
/// user-facing availability notices ("service temporarily unavailable — using cached data"),
/// not for control flow: listeners cannot influence breaker behavior, and a panicking
/// listener is isolated from the breaker and from the other listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerEvent {
    /// The breaker transitioned between states.
    StateChange {
        /// The breaker that transitioned.
        name: BreakerName,
        /// The state before the transition.
        from: CircuitState,
        /// The state after the transition.
        to: CircuitState,
        /// When the transition happened.
        at: SystemTime,
    },

    /// An executed operation failed with a service fault.
    Failure {
        /// The breaker that observed the failure.
        name: BreakerName,
        /// The breaker's state when the failure was recorded.
        state: CircuitState,
        /// When the failure was recorded.
        at: SystemTime,
    },
}

impl BreakerEvent {
    /// Returns the name of the breaker that published the event.
    #[must_use]
    pub const fn name(&self) -> &BreakerName {
        match self {
            Self::StateChange { name, .. } | Self::Failure { name, .. } => name,
        }
    }
}
