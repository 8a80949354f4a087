// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Shared key/value storage with change notification, as seen by one tab.
///
/// This models browser shared storage plus its cross-tab change events: a value written
/// through one handle becomes visible to every handle, and subscribers on *other* handles
/// are notified — the writer never hears its own writes, matching storage-event semantics.
///
/// Implementations back this with a native broadcast primitive, a storage-event polyfill,
/// or — in tests — the in-process [`LocalBus`].
pub trait TabBus {
    /// Stores `value` under `key` and notifies other handles subscribed to `key`.
    fn store(&self, key: &str, value: &str);

    /// Returns the current value under `key`.
    fn load(&self, key: &str) -> Option<String>;

    /// Removes the value under `key`, without notification.
    fn remove(&self, key: &str);

    /// Subscribes to values other handles store under `key`.
    fn subscribe(&self, key: &str, handler: Arc<dyn Fn(&str) + Send + Sync>);
}

/// An in-process [`TabBus`] where each handle plays the role of one tab.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use cart_sync::{LocalBus, TabBus};
///
/// let bus = LocalBus::new();
/// let tab_a = bus.handle();
/// let tab_b = bus.handle();
///
/// let heard = Arc::new(std::sync::atomic::AtomicUsize::new(0));
/// let counter = Arc::clone(&heard);
/// tab_b.subscribe("cart", Arc::new(move |_| {
///     counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
/// }));
///
/// tab_a.store("cart", "{}");
/// assert_eq!(heard.load(std::sync::atomic::Ordering::SeqCst), 1);
/// assert_eq!(tab_b.load("cart").as_deref(), Some("{}"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocalBus {
    shared: Arc<Shared>,
}

impl LocalBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle representing one tab.
    #[must_use]
    pub fn handle(&self) -> BusHandle {
        BusHandle {
            shared: Arc::clone(&self.shared),
            id: self.shared.next_handle.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// One tab's handle onto a [`LocalBus`].
#[derive(Clone)]
pub struct BusHandle {
    shared: Arc<Shared>,
    id: u64,
}

#[derive(Default)]
struct Shared {
    values: Mutex<HashMap<String, String>>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_handle: AtomicU64,
}

struct Subscriber {
    handle: u64,
    key: String,
    handler: Arc<dyn Fn(&str) + Send + Sync>,
}

impl TabBus for BusHandle {
    fn store(&self, key: &str, value: &str) {
        self.shared.values.lock().insert(key.to_string(), value.to_string());

        // Collect matching handlers first so none runs under the subscriber lock; a
        // handler is allowed to use the bus again.
        let handlers: Vec<Arc<dyn Fn(&str) + Send + Sync>> = {
            let subscribers = self.shared.subscribers.lock();
            subscribers
                .iter()
                .filter(|subscriber| subscriber.key == key && subscriber.handle != self.id)
                .map(|subscriber| Arc::clone(&subscriber.handler))
                .collect()
        };
        for handler in handlers {
            handler(value);
        }
    }

    fn load(&self, key: &str) -> Option<String> {
        self.shared.values.lock().get(key).cloned()
    }

    fn remove(&self, key: &str) {
        self.shared.values.lock().remove(key);
    }

    fn subscribe(&self, key: &str, handler: Arc<dyn Fn(&str) + Send + Sync>) {
        self.shared.subscribers.lock().push(Subscriber {
            handle: self.id,
            key: key.to_string(),
            handler,
        });
    }
}

impl Debug for BusHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Debug for Shared {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("values", &self.values.lock().len())
            .field("subscribers", &self.subscribers.lock().len())
            .finish_non_exhaustive()
    }
}
