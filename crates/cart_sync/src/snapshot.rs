// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::item::{self, CartItem};

/// Identifies one tab (window) of the application.
///
/// Used to ignore self-originated broadcasts and to attribute checkout locks. Identities
/// only need to be unique among the tabs of one browsing session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TabId(String);

impl TabId {
    /// Creates a tab identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TabId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A checksummed, timestamped serialization of cart contents broadcast between tabs.
///
/// A snapshot is only trusted after [`verify`][Self::verify] recomputes its checksum; a
/// mismatch means the payload was corrupted in storage or transit and must be discarded.
/// Ordering between snapshots is established by the embedded `timestamp_ms`, never by
/// delivery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// The cart's line items, in canonical order.
    pub items: Vec<CartItem>,

    /// Logical timestamp: milliseconds since the UNIX epoch at sealing time.
    pub timestamp_ms: u64,

    /// The tab that produced the snapshot.
    pub origin: TabId,

    /// Checksum over the canonical encoding of `items`.
    pub checksum: String,
}

impl CartSnapshot {
    /// Seals `items` into a snapshot, computing the checksum.
    #[must_use]
    pub fn seal(items: &[CartItem], timestamp_ms: u64, origin: TabId) -> Self {
        let items = item::sorted(items);
        let checksum = item::checksum(&items);
        Self {
            items,
            timestamp_ms,
            origin,
            checksum,
        }
    }

    /// Returns `true` when the checksum matches a fresh computation over `items`.
    #[must_use]
    pub fn verify(&self) -> bool {
        item::checksum(&self.items) == self.checksum
    }

    /// Encodes the snapshot for storage.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decodes a snapshot from storage, without verifying its checksum.
    ///
    /// # Errors
    ///
    /// Returns the decode error for malformed payloads.
    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_snapshots_verify() {
        let snapshot = CartSnapshot::seal(
            &[CartItem::new("9", "9-red", 2), CartItem::new("7", "7-blue", 1)],
            1_000,
            TabId::new("tab-a"),
        );
        assert!(snapshot.verify());
        // Sealing canonicalizes item order.
        assert_eq!(snapshot.items[0].product_id, "7");
    }

    #[test]
    fn tampered_items_fail_verification() {
        let mut snapshot = CartSnapshot::seal(&[CartItem::new("7", "7-blue", 1)], 1_000, TabId::new("tab-a"));
        snapshot.items[0].quantity = 5;
        assert!(!snapshot.verify());
    }

    #[test]
    fn encode_decode_round_trips() {
        let snapshot = CartSnapshot::seal(&[CartItem::new("7", "7-blue", 1)], 42, TabId::new("tab-a"));
        let decoded = CartSnapshot::decode(&snapshot.encode()).unwrap();
        assert_eq!(decoded, snapshot);
        assert!(decoded.verify());
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(CartSnapshot::decode("{not json").is_err());
    }
}
