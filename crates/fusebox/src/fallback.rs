// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;

type Producer<T> = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = T> + Send>> + Send>;

/// A substitute result used when a guarded operation is skipped or fails.
///
/// Callers supply a fallback alongside the operation handed to
/// [`CircuitBreaker::execute`][crate::CircuitBreaker::execute]. The breaker evaluates all
/// three variants uniformly:
///
/// - [`Fallback::None`]: no substitute; an open circuit or a service fault surfaces as an
///   error. This is the right choice for mutations, where silently "succeeding" with
///   fabricated data would be a correctness violation.
/// - [`Fallback::Value`]: a ready value, typically a slice of bundled static data or an
///   empty collection, chosen so the UI degrades rather than crashes.
/// - [`Fallback::Producer`]: a deferred computation, invoked only when the fallback is
///   actually needed.
///
/// # Examples
///
/// ```
/// use fusebox::Fallback;
///
/// let ready = Fallback::value(vec!["jacket", "scarf"]);
/// assert!(!ready.is_none());
///
/// let deferred = Fallback::producer(|| async { Vec::<&str>::new() });
/// assert!(!deferred.is_none());
///
/// let absent: Fallback<Vec<&str>> = Fallback::None;
/// assert!(absent.is_none());
/// ```
pub enum Fallback<T> {
    /// No fallback; failures and open circuits surface as errors.
    None,

    /// A ready substitute value.
    Value(T),

    /// A deferred substitute, produced only when needed.
    Producer(Producer<T>),
}

impl<T> Fallback<T> {
    /// Creates a fallback from a ready value.
    #[must_use]
    pub fn value(value: T) -> Self {
        Self::Value(value)
    }

    /// Creates a fallback from an async producer, invoked only when the fallback is needed.
    #[must_use]
    pub fn producer<F, Fut>(producer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::Producer(Box::new(move || Box::pin(producer())))
    }

    /// Returns `true` when no fallback was supplied.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Resolves the fallback to a value, or `None` when absent.
    pub(crate) async fn produce(self) -> Option<T> {
        match self {
            Self::None => None,
            Self::Value(value) => Some(value),
            Self::Producer(producer) => Some(producer().await),
        }
    }
}

impl<T> Debug for Fallback<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("Fallback::None"),
            Self::Value(_) => f.write_str("Fallback::Value"),
            Self::Producer(_) => f.write_str("Fallback::Producer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_resolves_without_async_machinery() {
        let fallback = Fallback::value(7);
        let produced = futures::executor::block_on(fallback.produce());
        assert_eq!(produced, Some(7));
    }

    #[test]
    fn producer_is_deferred_until_produce() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let invoked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&invoked);
        let fallback = Fallback::producer(move || {
            flag.store(true, Ordering::SeqCst);
            async { "stale" }
        });

        assert!(!invoked.load(Ordering::SeqCst));
        let produced = futures::executor::block_on(fallback.produce());
        assert_eq!(produced, Some("stale"));
        assert!(invoked.load(Ordering::SeqCst));
    }

    #[test]
    fn none_produces_nothing() {
        let fallback: Fallback<i32> = Fallback::None;
        assert_eq!(futures::executor::block_on(fallback.produce()), None);
    }
}
