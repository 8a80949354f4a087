// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::BreakerName;

/// The error surface of [`CircuitBreaker::execute`][crate::CircuitBreaker::execute].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BreakerError<E> {
    /// The circuit is open and no fallback was available; the operation never ran.
    ///
    /// Carries the breaker's name so callers can translate the rejection into an
    /// endpoint-specific "temporarily unavailable" message.
    #[error("circuit '{name}' is open")]
    Open {
        /// The name of the breaker that rejected the call.
        name: BreakerName,
    },

    /// The operation ran and failed; the underlying error is passed through.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns `true` when the call was rejected by an open circuit.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Returns the underlying operation error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Open { .. } => None,
            Self::Inner(inner) => Some(inner),
        }
    }
}
