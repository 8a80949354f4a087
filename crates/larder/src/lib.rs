// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A small TTL key/value store for serving last-known-good data.
//!
//! A [`Larder`] is the pantry an application falls back on when its backend is unavailable:
//! every successful read opportunistically stores its payload under a business-meaningful key
//! (`product:42`, `products:featured`), and a later failure — typically a circuit breaker
//! rejecting the call with no explicit fallback — serves the stale-but-available value
//! instead of failing outright.
//!
//! Entries expire after a TTL (5 minutes by default, overridable per write). Reads past
//! expiry are treated as absent and evicted lazily; there is no background sweeper.
//!
//! # Examples
//!
//! ```
//! use larder::Larder;
//! use sundial::Clock;
//!
//! let clock = Clock::new();
//! let cache: Larder<String> = Larder::new(&clock);
//!
//! cache.put("product:42", "wool coat".to_string());
//! assert_eq!(cache.get("product:42"), Some("wool coat".to_string()));
//! assert_eq!(cache.get("product:7"), None);
//! ```
//!
//! Serializable values can be exported as a JSON snapshot and restored later (for example
//! across page reloads), preserving each entry's remaining TTL; see [`Larder::export`] and
//! [`Larder::restore`].

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sundial::Clock;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// A TTL key/value store holding the last known good payload per business key.
///
/// Keys are caller-supplied strings carrying business meaning (`product:123`), distinct from
/// any request-level deduplication signature. Values are cloned out on read.
pub struct Larder<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    clock: Clock,
    default_ttl: Duration,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V: Clone> Larder<V> {
    /// Creates a store with the default 5-minute TTL.
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        Self::with_default_ttl(DEFAULT_TTL, clock)
    }

    /// Creates a store whose unqualified writes use `default_ttl`.
    #[must_use]
    pub fn with_default_ttl(default_ttl: Duration, clock: &Clock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock: clock.clone(),
            default_ttl,
        }
    }

    /// Stores `value` under `key` with the default TTL, replacing any previous entry.
    pub fn put(&self, key: impl Into<String>, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Stores `value` under `key` with an explicit TTL.
    pub fn put_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = self.clock.instant() + ttl;
        self.entries.lock().insert(key.into(), Entry { value, expires_at });
    }

    /// Returns the value under `key`, or `None` when absent or expired.
    ///
    /// An expired entry is evicted on the spot.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.instant();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Removes and returns the value under `key`, expired or not.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.lock().remove(key).map(|entry| entry.value)
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.instant();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Returns the number of stored entries, including any not yet lazily evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` when the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// A serialized entry inside an exported snapshot.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct PersistedEntry<V> {
    key: String,
    value: V,
    remaining_ms: u64,
}

impl<V: Clone + Serialize + DeserializeOwned> Larder<V> {
    /// Exports the selected, unexpired entries as a JSON snapshot.
    ///
    /// Each entry records its remaining TTL so a later [`restore`][Self::restore] does not
    /// extend its lifetime. Unknown and expired keys are skipped.
    #[must_use]
    pub fn export(&self, keys: &[&str]) -> String {
        let now = self.clock.instant();
        let entries = self.entries.lock();

        let persisted: Vec<PersistedEntry<V>> = keys
            .iter()
            .filter_map(|key| {
                let entry = entries.get(*key)?;
                let remaining = entry.expires_at.checked_duration_since(now)?;
                Some(PersistedEntry {
                    key: (*key).to_string(),
                    value: entry.value.clone(),
                    remaining_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
                })
            })
            .collect();

        serde_json::to_string(&persisted).unwrap_or_else(|_| "[]".to_string())
    }

    /// Restores entries from a snapshot produced by [`export`][Self::export].
    ///
    /// Entries whose remaining TTL was zero are skipped. Returns how many entries were
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns the underlying decode error when `snapshot` is not a valid export.
    pub fn restore(&self, snapshot: &str) -> Result<usize, serde_json::Error> {
        let persisted: Vec<PersistedEntry<V>> = serde_json::from_str(snapshot)?;
        let now = self.clock.instant();

        let mut entries = self.entries.lock();
        let mut stored = 0;
        for entry in persisted {
            if entry.remaining_ms == 0 {
                continue;
            }
            entries.insert(
                entry.key,
                Entry {
                    value: entry.value,
                    expires_at: now + Duration::from_millis(entry.remaining_ms),
                },
            );
            stored += 1;
        }

        Ok(stored)
    }
}

impl<V> Debug for Larder<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Larder")
            .field("entries", &self.entries.lock().len())
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use sundial::ClockControl;

    use super::*;

    fn store_with_control() -> (Larder<String>, ClockControl) {
        let control = ClockControl::new();
        let clock = control.to_clock();
        (Larder::new(&clock), control)
    }

    #[test]
    fn serves_until_expiry_then_treats_as_absent() {
        let (store, control) = store_with_control();
        store.put("product:1", "trench coat".to_string());

        control.advance(Duration::from_secs(299));
        assert_eq!(store.get("product:1"), Some("trench coat".to_string()));

        control.advance(Duration::from_secs(2));
        assert_eq!(store.get("product:1"), None);
        // The expired entry was evicted by the read.
        assert!(store.is_empty());
    }

    #[test]
    fn per_write_ttl_overrides_default() {
        let (store, control) = store_with_control();
        store.put_with_ttl("session", "token".to_string(), Duration::from_secs(10));

        control.advance(Duration::from_secs(11));
        assert_eq!(store.get("session"), None);
    }

    #[test]
    fn replacing_an_entry_refreshes_its_ttl() {
        let (store, control) = store_with_control();
        store.put("product:1", "old".to_string());

        control.advance(Duration::from_secs(200));
        store.put("product:1", "new".to_string());

        control.advance(Duration::from_secs(200));
        assert_eq!(store.get("product:1"), Some("new".to_string()));
    }

    #[test]
    fn purge_drops_only_expired_entries() {
        let (store, control) = store_with_control();
        store.put_with_ttl("short", "a".to_string(), Duration::from_secs(5));
        store.put("long", "b".to_string());

        control.advance(Duration::from_secs(6));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long"), Some("b".to_string()));
    }

    #[test]
    fn export_and_restore_preserve_remaining_ttl() {
        let (store, control) = store_with_control();
        store.put("product:1", "coat".to_string());
        store.put("product:2", "scarf".to_string());

        control.advance(Duration::from_secs(100));
        let snapshot = store.export(&["product:1", "missing"]);

        let clock = control.to_clock();
        let restored: Larder<String> = Larder::new(&clock);
        assert_eq!(restored.restore(&snapshot).unwrap(), 1);
        assert_eq!(restored.get("product:1"), Some("coat".to_string()));

        // 200 seconds remained at export time; the restored entry expires on schedule.
        control.advance(Duration::from_secs(201));
        assert_eq!(restored.get("product:1"), None);
    }

    #[test]
    fn restore_rejects_garbage() {
        let (store, _control) = store_with_control();
        assert!(store.restore("not json").is_err());
        assert!(store.is_empty());
    }
}
