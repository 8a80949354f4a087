// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;
use sundial::Clock;

use crate::{BreakerEvent, BreakerMetrics, BreakerName, BreakerOptions, CircuitBreaker};

type SharedListener = Arc<dyn Fn(&BreakerEvent) + Send + Sync>;

/// A process-wide map from endpoint name to [`CircuitBreaker`] instance.
///
/// The registry guarantees at most one breaker per name ("get-or-create" semantics), so every
/// part of the application guarding calls against the same logical endpoint shares failure
/// history. Construct one registry per application context and pass it explicitly; this keeps
/// the breaker lifecycle testable and avoids cross-test leakage.
///
/// # Examples
///
/// ```
/// use fusebox::{BreakerRegistry, CircuitState};
/// use sundial::Clock;
///
/// let clock = Clock::new();
/// let registry = BreakerRegistry::new(&clock);
///
/// let products = registry.get("products");
/// assert_eq!(products.state(), CircuitState::Closed);
///
/// // The same name always yields the same instance.
/// assert!(std::sync::Arc::ptr_eq(&products, &registry.get("products")));
/// ```
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<BreakerName, Arc<CircuitBreaker>>>,
    listeners: Mutex<Vec<SharedListener>>,
    defaults: BreakerOptions,
    clock: Clock,
}

impl BreakerRegistry {
    /// Creates a registry whose breakers use default [`BreakerOptions`].
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        Self::with_defaults(BreakerOptions::default(), clock)
    }

    /// Creates a registry whose breakers use `defaults` unless overridden per name.
    #[must_use]
    pub fn with_defaults(defaults: BreakerOptions, clock: &Clock) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            defaults,
            clock: clock.clone(),
        }
    }

    /// Returns the breaker for `name`, creating it with the registry defaults if absent.
    pub fn get(&self, name: impl Into<BreakerName>) -> Arc<CircuitBreaker> {
        let name = name.into();
        let options = self.defaults.clone();
        self.get_or_create(name, options)
    }

    /// Returns the breaker for `name`, creating it with `options` if absent.
    ///
    /// Options only apply on creation; an existing breaker keeps its original configuration.
    pub fn get_with(&self, name: impl Into<BreakerName>, options: BreakerOptions) -> Arc<CircuitBreaker> {
        self.get_or_create(name.into(), options)
    }

    fn get_or_create(&self, name: BreakerName, options: BreakerOptions) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        if let Some(existing) = breakers.get(&name) {
            return Arc::clone(existing);
        }

        let breaker = Arc::new(CircuitBreaker::new(name.clone(), options, &self.clock));
        for listener in self.listeners.lock().iter() {
            breaker.subscribe_shared(Arc::clone(listener));
        }
        breakers.insert(name, Arc::clone(&breaker));
        breaker
    }

    /// Registers a listener on every breaker, existing and future.
    pub fn subscribe_all(&self, listener: impl Fn(&BreakerEvent) + Send + Sync + 'static) {
        let listener: SharedListener = Arc::new(listener);
        for breaker in self.breakers.lock().values() {
            breaker.subscribe_shared(Arc::clone(&listener));
        }
        self.listeners.lock().push(listener);
    }

    /// Returns a metrics snapshot for every registered breaker.
    #[must_use]
    pub fn all_metrics(&self) -> HashMap<BreakerName, BreakerMetrics> {
        self.breakers
            .lock()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.metrics()))
            .collect()
    }

    /// Forces every breaker to closed with zeroed counters.
    ///
    /// Safe to call concurrently with in-flight operations: they complete under whatever
    /// state they observed when admitted.
    pub fn reset_all(&self) {
        for breaker in self.breakers.lock().values() {
            breaker.reset();
        }
    }

    /// Resets the breaker for `name`. Returns `false` when no such breaker exists.
    pub fn reset(&self, name: impl Into<BreakerName>) -> bool {
        let name = name.into();
        let breaker = self.breakers.lock().get(&name).map(Arc::clone);
        breaker.map(|breaker| breaker.reset()).is_some()
    }

    /// Returns the number of registered breakers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.lock().len()
    }

    /// Returns `true` when no breaker has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.lock().is_empty()
    }
}

impl Debug for BreakerRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("breakers", &self.len())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::executor::block_on;
    use sundial::Clock;

    use super::*;
    use crate::{CircuitState, Fallback, Fault};

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("outage")]
    struct Outage;

    impl Fault for Outage {
        fn is_service_fault(&self) -> bool {
            true
        }
    }

    fn registry() -> BreakerRegistry {
        let clock = Clock::new_frozen();
        BreakerRegistry::with_defaults(
            BreakerOptions::new()
                .failure_threshold(2)
                .reset_timeout(Duration::from_secs(30)),
            &clock,
        )
    }

    #[test]
    fn get_is_idempotent() {
        let registry = registry();
        let first = registry.get("cart");
        let second = registry.get("cart".to_string());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn per_name_options_apply_only_on_creation() {
        let registry = registry();
        let strict = registry.get_with("orders", BreakerOptions::new().failure_threshold(1));

        block_on(async {
            let _ = strict
                .execute(|| async { Err::<(), _>(Outage) }, Fallback::None)
                .await;
        });
        assert_eq!(strict.state(), CircuitState::Open);

        // A later get_with for the same name returns the existing instance unchanged.
        let same = registry.get_with("orders", BreakerOptions::new().failure_threshold(100));
        assert!(Arc::ptr_eq(&strict, &same));
    }

    #[test]
    fn all_metrics_covers_every_breaker() {
        let registry = registry();
        let _ = registry.get("products");
        let _ = registry.get("auth");

        let metrics = registry.all_metrics();
        assert_eq!(metrics.len(), 2);
        assert!(metrics.contains_key(&BreakerName::from("products")));
        assert!(metrics.contains_key(&BreakerName::from("auth")));
    }

    #[test]
    fn reset_all_closes_every_breaker() {
        let registry = registry();
        let products = registry.get("products");
        let cart = registry.get("cart");

        block_on(async {
            for breaker in [&products, &cart] {
                for _ in 0..2 {
                    let _ = breaker
                        .execute(|| async { Err::<(), _>(Outage) }, Fallback::None)
                        .await;
                }
            }
        });
        assert_eq!(products.state(), CircuitState::Open);
        assert_eq!(cart.state(), CircuitState::Open);

        registry.reset_all();
        assert_eq!(products.state(), CircuitState::Closed);
        assert_eq!(cart.state(), CircuitState::Closed);
    }

    #[test]
    fn reset_by_name_reports_missing_breakers() {
        let registry = registry();
        let _ = registry.get("products");

        assert!(registry.reset("products"));
        assert!(!registry.reset("unknown"));
    }

    #[test]
    fn subscribe_all_covers_existing_and_future_breakers() {
        let registry = registry();
        let _ = registry.get("products");

        let observed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&observed);
        registry.subscribe_all(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let later = registry.get("orders");
        block_on(async {
            let _ = registry
                .get("products")
                .execute(|| async { Err::<(), _>(Outage) }, Fallback::None)
                .await;
            let _ = later
                .execute(|| async { Err::<(), _>(Outage) }, Fallback::None)
                .await;
        });

        // One failure event from each breaker.
        assert_eq!(observed.load(Ordering::SeqCst), 2);
    }
}
