// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sundial::Clock;

use crate::TabBus;
use crate::item::{self, CartItem};
use crate::snapshot::{CartSnapshot, TabId};

pub(crate) const CART_SNAPSHOT_KEY: &str = "storefront.cart.snapshot";

/// How a tab resolves a genuine conflict between its cart and an incoming snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    /// Surface the conflict for the user to decide via
    /// [`CartSync::resolve`]; conflicts are queued and never dropped silently.
    Manual,

    /// Combine both sides deterministically: the union of line items, keeping the larger
    /// quantity per (product, variant) key. Idempotent and symmetric, so replayed
    /// broadcasts and identical both-side additions never double-count.
    #[default]
    AutoMerge,

    /// Adopt whichever side carries the later embedded timestamp. Timestamp ties go to
    /// the lexicographically larger tab identity, so both tabs decide identically.
    LastWriteWins,
}

/// Configuration for a [`CartSync`] instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    pub(crate) tab: TabId,
    pub(crate) debounce: Duration,
    pub(crate) conflict_resolution: ConflictResolution,
}

impl SyncOptions {
    /// Creates options for the given tab with a 500 ms debounce and
    /// [`ConflictResolution::AutoMerge`].
    #[must_use]
    pub fn new(tab: TabId) -> Self {
        Self {
            tab,
            debounce: Duration::from_millis(500),
            conflict_resolution: ConflictResolution::default(),
        }
    }

    /// Sets the window in which bursts of mutations coalesce into one broadcast.
    #[must_use]
    pub const fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the conflict resolution policy.
    #[must_use]
    pub const fn conflict_resolution(mut self, policy: ConflictResolution) -> Self {
        self.conflict_resolution = policy;
        self
    }
}

/// Why an incoming snapshot was discarded without touching the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The payload did not decode as a snapshot.
    Malformed,

    /// The checksum did not match a fresh computation over the items.
    ChecksumMismatch,
}

/// A conflict awaiting manual resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConflict {
    /// This tab's items at the time the conflict was detected.
    pub local: Vec<CartItem>,

    /// The conflicting remote snapshot.
    pub remote: CartSnapshot,
}

/// The caller's decision for a manually surfaced conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Keep this tab's items and broadcast them.
    KeepLocal,

    /// Adopt the remote snapshot's items wholesale.
    AcceptRemote,

    /// Combine both sides with the deterministic auto-merge rule.
    Merge,
}

/// What processing an incoming snapshot did to the local cart.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The remote snapshot was adopted wholesale.
    Applied,

    /// Both sides were combined by the auto-merge rule.
    Merged,

    /// No structural difference; nothing changed.
    Unchanged,

    /// The local cart won under [`ConflictResolution::LastWriteWins`].
    KeptLocal,

    /// The snapshot originated from this tab and was ignored.
    OwnEcho,

    /// The snapshot was corrupt and produced no cart mutation.
    Discarded(DiscardReason),

    /// A genuine conflict under [`ConflictResolution::Manual`], queued for
    /// [`CartSync::resolve`].
    Conflict(SyncConflict),
}

/// Keeps one tab's cart in sync with every other tab of the same session.
///
/// Local mutations are applied in issue order, debounced, and then sealed into a
/// [`CartSnapshot`] that is persisted and broadcast through the [`TabBus`]. Incoming
/// snapshots are checksum-verified, compared structurally, and — when both sides diverged —
/// resolved under the configured [`ConflictResolution`]. Accepted snapshots replace the
/// local cart wholesale so the result matches the snapshot exactly.
///
/// The host is expected to call [`pump`][Self::pump] from its event loop (or timer) so
/// debounced publications actually go out; [`flush`][Self::flush] publishes immediately.
pub struct CartSync<B> {
    pub(crate) bus: B,
    pub(crate) options: SyncOptions,
    pub(crate) clock: Clock,
    state: Mutex<LocalState>,
    conflicts: Mutex<Vec<SyncConflict>>,
}

#[derive(Debug)]
struct LocalState {
    items: Vec<CartItem>,
    /// Epoch milliseconds of the last local mutation; `0` when the cart never changed.
    last_local_change_ms: u64,
    publish_due: Option<Instant>,
}

impl<B: TabBus> CartSync<B> {
    /// Creates a sync instance for one tab.
    #[must_use]
    pub fn new(bus: B, options: SyncOptions, clock: &Clock) -> Self {
        Self {
            bus,
            options,
            clock: clock.clone(),
            state: Mutex::new(LocalState {
                items: Vec::new(),
                last_local_change_ms: 0,
                publish_due: None,
            }),
            conflicts: Mutex::new(Vec::new()),
        }
    }

    /// Subscribes `sync` to snapshots broadcast by other tabs.
    ///
    /// Incoming snapshots are processed by [`receive`][Self::receive]; manual-policy
    /// conflicts queue up for [`take_conflicts`][Self::take_conflicts].
    pub fn attach(sync: &Arc<Self>)
    where
        B: Send + Sync + 'static,
    {
        let weak = Arc::downgrade(sync);
        sync.bus.subscribe(
            CART_SNAPSHOT_KEY,
            Arc::new(move |payload| {
                if let Some(sync) = weak.upgrade() {
                    let _ = sync.receive(payload);
                }
            }),
        );
    }

    /// Returns this tab's identity.
    #[must_use]
    pub const fn tab(&self) -> &TabId {
        &self.options.tab
    }

    /// Returns the current cart items in canonical order.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        item::sorted(&self.state.lock().items)
    }

    /// Adds a line item, summing quantities for an existing (product, variant) line.
    pub fn add_item(&self, new_item: CartItem) {
        let mut state = self.state.lock();
        if let Some(existing) = state
            .items
            .iter_mut()
            .find(|line| line.line_key() == new_item.line_key())
        {
            existing.quantity = existing.quantity.saturating_add(new_item.quantity);
        } else {
            state.items.push(new_item);
        }
        self.mark_local_change(&mut state);
    }

    /// Sets the quantity of a line, inserting it if absent and removing it at zero.
    pub fn set_quantity(&self, product_id: &str, variant_id: &str, quantity: u32) {
        let mut state = self.state.lock();
        if quantity == 0 {
            state.items.retain(|line| line.line_key() != (product_id, variant_id));
        } else if let Some(existing) = state
            .items
            .iter_mut()
            .find(|line| line.line_key() == (product_id, variant_id))
        {
            existing.quantity = quantity;
        } else {
            state.items.push(CartItem::new(product_id, variant_id, quantity));
        }
        self.mark_local_change(&mut state);
    }

    /// Removes a line item.
    pub fn remove_item(&self, product_id: &str, variant_id: &str) {
        let mut state = self.state.lock();
        state.items.retain(|line| line.line_key() != (product_id, variant_id));
        self.mark_local_change(&mut state);
    }

    /// Empties the cart.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        self.mark_local_change(&mut state);
    }

    /// Publishes the pending snapshot once the debounce window has elapsed.
    ///
    /// Call this from the host's event loop. Returns `true` when a snapshot went out.
    pub fn pump(&self) -> bool {
        let due = self.state.lock().publish_due;
        match due {
            Some(due) if self.clock.instant() >= due => {
                self.publish_now();
                true
            }
            _ => false,
        }
    }

    /// Publishes the current cart immediately, bypassing the debounce window.
    pub fn flush(&self) {
        self.publish_now();
    }

    /// Returns `true` when a debounced publication is still pending.
    #[must_use]
    pub fn publish_pending(&self) -> bool {
        self.state.lock().publish_due.is_some()
    }

    /// Processes a snapshot received from another tab.
    pub fn receive(&self, payload: &str) -> SyncOutcome {
        let Ok(snapshot) = CartSnapshot::decode(payload) else {
            tracing::warn!(tab = %self.options.tab, "discarding malformed cart snapshot");
            return SyncOutcome::Discarded(DiscardReason::Malformed);
        };
        if !snapshot.verify() {
            tracing::warn!(
                tab = %self.options.tab,
                origin = %snapshot.origin,
                "discarding cart snapshot with checksum mismatch"
            );
            return SyncOutcome::Discarded(DiscardReason::ChecksumMismatch);
        }
        if snapshot.origin == self.options.tab {
            return SyncOutcome::OwnEcho;
        }

        let remote_items = item::sorted(&snapshot.items);
        let mut state = self.state.lock();

        if item::sorted(&state.items) == remote_items {
            return SyncOutcome::Unchanged;
        }

        // The remote snapshot postdates every local change: adopt it wholesale.
        if state.last_local_change_ms < snapshot.timestamp_ms {
            state.items = remote_items;
            return SyncOutcome::Applied;
        }

        // Both sides diverged; the configured policy decides. Ordering is based on the
        // embedded timestamps, never on bus delivery order.
        match self.options.conflict_resolution {
            ConflictResolution::Manual => {
                let conflict = SyncConflict {
                    local: state.items.clone(),
                    remote: snapshot,
                };
                drop(state);
                tracing::info!(tab = %self.options.tab, "cart conflict queued for manual resolution");
                self.conflicts.lock().push(conflict.clone());
                SyncOutcome::Conflict(conflict)
            }
            ConflictResolution::AutoMerge => {
                let merged = merge(&state.items, &remote_items);
                if item::sorted(&state.items) == merged {
                    return SyncOutcome::Unchanged;
                }
                state.items = merged;
                self.mark_local_change(&mut state);
                SyncOutcome::Merged
            }
            ConflictResolution::LastWriteWins => {
                let remote_wins = snapshot.timestamp_ms == state.last_local_change_ms
                    && snapshot.origin > self.options.tab;
                if remote_wins {
                    state.items = remote_items;
                    SyncOutcome::Applied
                } else {
                    SyncOutcome::KeptLocal
                }
            }
        }
    }

    /// Applies the caller's decision for a manually surfaced conflict and returns the
    /// resulting items.
    pub fn resolve(&self, conflict: &SyncConflict, choice: ConflictChoice) -> Vec<CartItem> {
        let items = {
            let mut state = self.state.lock();
            match choice {
                ConflictChoice::KeepLocal => self.mark_local_change(&mut state),
                ConflictChoice::AcceptRemote => {
                    state.items = item::sorted(&conflict.remote.items);
                }
                ConflictChoice::Merge => {
                    state.items = merge(&state.items, &conflict.remote.items);
                    self.mark_local_change(&mut state);
                }
            }
            item::sorted(&state.items)
        };

        self.conflicts.lock().retain(|queued| queued != conflict);
        items
    }

    /// Drains the queue of conflicts awaiting manual resolution.
    pub fn take_conflicts(&self) -> Vec<SyncConflict> {
        std::mem::take(&mut *self.conflicts.lock())
    }

    fn mark_local_change(&self, state: &mut LocalState) {
        state.last_local_change_ms = self.clock.epoch_millis();
        state.publish_due = Some(self.clock.instant() + self.options.debounce);
    }

    fn publish_now(&self) {
        let (items, timestamp_ms) = {
            let mut state = self.state.lock();
            state.publish_due = None;
            (state.items.clone(), self.clock.epoch_millis())
        };

        let snapshot = CartSnapshot::seal(&items, timestamp_ms, self.options.tab.clone());
        self.bus.store(CART_SNAPSHOT_KEY, &snapshot.encode());
        tracing::debug!(tab = %self.options.tab, lines = items.len(), "published cart snapshot");
    }
}

/// The deterministic auto-merge rule: union of line items, larger quantity wins per
/// (product, variant) key. Output is in canonical order.
fn merge(local: &[CartItem], remote: &[CartItem]) -> Vec<CartItem> {
    let mut merged: BTreeMap<(String, String), u32> = BTreeMap::new();
    for line in local.iter().chain(remote) {
        let quantity = merged
            .entry((line.product_id.clone(), line.variant_id.clone()))
            .or_insert(0);
        *quantity = (*quantity).max(line.quantity);
    }

    merged
        .into_iter()
        .map(|((product_id, variant_id), quantity)| CartItem::new(product_id, variant_id, quantity))
        .collect()
}

impl<B> Debug for CartSync<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSync")
            .field("tab", &self.options.tab)
            .field("lines", &self.state.lock().items.len())
            .finish_non_exhaustive()
    }
}
