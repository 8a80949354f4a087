// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Thin cache-optimization layer: predictive prefetching, memory-pressure cleanup, and
//! persistence of the critical cache subset across reloads.

use coalesce::Priority;

use crate::api::ApiClient;
use crate::context::ApiContext;
use crate::transport::Transport;

/// The fallback-cache keys worth carrying across page reloads.
const CRITICAL_KEYS: [&str; 2] = ["products:featured", "categories"];

/// What an idle-time warming pass should prefetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmPlan {
    /// Prefetch the featured rail.
    pub featured: bool,

    /// Prefetch the category list.
    pub categories: bool,

    /// Individual products to prefetch (e.g. neighbours of the product being viewed).
    pub product_ids: Vec<String>,
}

impl Default for WarmPlan {
    fn default() -> Self {
        Self {
            featured: true,
            categories: true,
            product_ids: Vec::new(),
        }
    }
}

impl<T: Transport> ApiClient<T> {
    /// Runs an idle-time warming pass, populating the response and fallback caches.
    ///
    /// Best effort by design: individual failures are logged by the query paths and do
    /// not abort the pass. Returns how many prefetches completed.
    pub async fn warm(&self, plan: &WarmPlan) -> usize {
        let mut completed = 0;

        if plan.featured && self.featured_products().await.is_ok() {
            completed += 1;
        }
        if plan.categories && self.categories().await.is_ok() {
            completed += 1;
        }
        for id in &plan.product_ids {
            if self.product_by_id(id).await.is_ok() {
                completed += 1;
            }
        }

        tracing::debug!(completed, "cache warming pass finished");
        completed
    }
}

impl ApiContext {
    /// Sheds cache weight under memory pressure: expired entries go first, then
    /// low-priority responses. Returns how many entries were dropped.
    pub fn relieve_memory_pressure(&self) -> usize {
        let dropped =
            self.dedup.purge_expired() + self.dedup.evict_below(Priority::Normal) + self.larder.purge_expired();
        tracing::debug!(dropped, "relieved cache memory pressure");
        dropped
    }

    /// Exports the critical fallback-cache subset as a JSON snapshot for persistence
    /// across reloads.
    #[must_use]
    pub fn export_critical(&self) -> String {
        self.larder.export(&CRITICAL_KEYS)
    }

    /// Restores a snapshot produced by [`export_critical`][Self::export_critical].
    /// Returns how many entries were restored; corrupt snapshots restore nothing.
    pub fn restore_critical(&self, snapshot: &str) -> usize {
        self.larder.restore(snapshot).unwrap_or_else(|_| {
            tracing::warn!("discarding corrupt critical-cache snapshot");
            0
        })
    }
}
