// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cross-tab cart synchronization with conflict resolution.
//!
//! A shopper often has the same store open in several tabs. This crate keeps their carts
//! consistent: every local mutation is debounced, sealed into a checksummed
//! [`CartSnapshot`], persisted to shared storage, and broadcast; other tabs validate the
//! checksum, detect conflicts against their own state, and resolve them under a configured
//! [`ConflictResolution`] policy. A lightweight advisory [checkout lock]
//! (`CartSync::begin_checkout`) prevents two tabs from submitting the same order.
//!
//! The transport is abstracted behind the [`TabBus`] trait — publish/subscribe over shared
//! keys — so the same conflict-resolution logic runs against a native broadcast primitive,
//! a storage-event polyfill, or the in-process [`LocalBus`] used in tests.
//!
//! # Ordering
//!
//! Conflicts are decided by the logical timestamp embedded in each snapshot, never by the
//! arrival order of bus notifications, which the platform may reorder.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use cart_sync::{CartItem, CartSync, LocalBus, SyncOptions, TabId};
//! use sundial::Clock;
//!
//! let clock = Clock::new();
//! let bus = LocalBus::new();
//!
//! let tab_a = CartSync::new(bus.handle(), SyncOptions::new(TabId::new("tab-a")), &clock);
//! let tab_b = Arc::new(CartSync::new(bus.handle(), SyncOptions::new(TabId::new("tab-b")), &clock));
//! CartSync::attach(&tab_b);
//!
//! tab_a.add_item(CartItem::new("7", "7-blue", 1));
//! tab_a.flush();
//!
//! assert_eq!(tab_b.items(), tab_a.items());
//! ```

mod bus;
mod checkout;
mod item;
mod snapshot;
mod sync;

pub use bus::{BusHandle, LocalBus, TabBus};
pub use checkout::{CheckoutError, CheckoutGuard};
pub use item::{CartItem, checksum};
pub use snapshot::{CartSnapshot, TabId};
pub use sync::{CartSync, ConflictChoice, ConflictResolution, DiscardReason, SyncConflict, SyncOptions, SyncOutcome};
