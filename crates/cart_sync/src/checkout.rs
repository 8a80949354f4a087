// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::snapshot::TabId;
use crate::sync::CartSync;
use crate::{TabBus, item};

pub(crate) const CHECKOUT_LOCK_KEY: &str = "storefront.checkout.lock";

/// A lock older than this is considered abandoned and ignorable by a competing tab.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(300);

/// The advisory lock record written to shared storage while a tab runs checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CheckoutLock {
    tab: TabId,
    acquired_at_ms: u64,
    cart_checksum: String,
}

/// Checkout could not start in this tab.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    /// Another tab holds a fresh checkout lock.
    #[error("another tab ({holder}) is processing this order")]
    AnotherTab {
        /// The tab currently holding the lock.
        holder: TabId,
    },
}

/// Holds the cross-tab checkout lock; dropping it releases the lock.
///
/// The guard covers completion, error, and unmount paths alike: however checkout ends, the
/// lock is cleared when the guard goes out of scope.
pub struct CheckoutGuard<'a, B: TabBus> {
    sync: &'a CartSync<B>,
}

impl<B: TabBus> CheckoutGuard<'_, B> {
    /// Releases the lock explicitly on successful completion.
    pub fn complete(self) {}
}

impl<B: TabBus> Drop for CheckoutGuard<'_, B> {
    fn drop(&mut self) {
        self.sync.end_checkout();
    }
}

impl<B: TabBus> Debug for CheckoutGuard<'_, B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutGuard").finish_non_exhaustive()
    }
}

impl<B: TabBus> CartSync<B> {
    /// Starts checkout in this tab, refusing when another tab holds a fresh lock.
    ///
    /// This is advisory locking over shared storage: it prevents double submission through
    /// normal UI flows across tabs, not atomicity against a hard crash — which is why a
    /// lock goes stale after five minutes instead of blocking forever.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::AnotherTab`] when a different tab holds a non-stale lock.
    pub fn begin_checkout(&self) -> Result<CheckoutGuard<'_, B>, CheckoutError> {
        let now_ms = self.clock.epoch_millis();

        if let Some(raw) = self.bus.load(CHECKOUT_LOCK_KEY)
            && let Ok(lock) = serde_json::from_str::<CheckoutLock>(&raw)
            && lock.tab != *self.tab()
            && Duration::from_millis(now_ms.saturating_sub(lock.acquired_at_ms)) < LOCK_STALE_AFTER
        {
            tracing::info!(tab = %self.tab(), holder = %lock.tab, "checkout refused; lock held elsewhere");
            return Err(CheckoutError::AnotherTab { holder: lock.tab });
        }

        let lock = CheckoutLock {
            tab: self.tab().clone(),
            acquired_at_ms: now_ms,
            cart_checksum: item::checksum(&self.items()),
        };
        self.bus
            .store(CHECKOUT_LOCK_KEY, &serde_json::to_string(&lock).unwrap_or_default());

        Ok(CheckoutGuard { sync: self })
    }

    pub(crate) fn end_checkout(&self) {
        // Only clear a lock this tab owns; a stale takeover may have replaced it.
        if let Some(raw) = self.bus.load(CHECKOUT_LOCK_KEY)
            && let Ok(lock) = serde_json::from_str::<CheckoutLock>(&raw)
            && lock.tab == *self.tab()
        {
            self.bus.remove(CHECKOUT_LOCK_KEY);
        }
    }
}
