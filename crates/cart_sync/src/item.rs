// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// One line in a cart: a product variant and its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// The product identifier.
    pub product_id: String,

    /// The specific variant (size/color) of the product.
    pub variant_id: String,

    /// How many units of the variant are in the cart.
    pub quantity: u32,
}

impl CartItem {
    /// Creates a line item.
    #[must_use]
    pub fn new(product_id: impl Into<String>, variant_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: variant_id.into(),
            quantity,
        }
    }

    /// The identity a line is merged under: product plus variant.
    #[must_use]
    pub fn line_key(&self) -> (&str, &str) {
        (&self.product_id, &self.variant_id)
    }
}

/// Computes the checksum of a cart over its canonical encoding.
///
/// Canonical means sorted by (product, variant) and serialized compactly, so item order and
/// formatting differences cannot produce distinct checksums for the same cart.
#[must_use]
pub fn checksum(items: &[CartItem]) -> String {
    format!("{:016x}", xxh3_64(canonical(items).as_bytes()))
}

/// Returns the canonical compact encoding of `items`.
pub(crate) fn canonical(items: &[CartItem]) -> String {
    let mut sorted: Vec<&CartItem> = items.iter().collect();
    sorted.sort_by(|a, b| a.line_key().cmp(&b.line_key()));
    serde_json::to_string(&sorted).unwrap_or_default()
}

/// Returns `items` sorted into canonical order.
pub(crate) fn sorted(items: &[CartItem]) -> Vec<CartItem> {
    let mut items = items.to_vec();
    items.sort_by(|a, b| a.line_key().cmp(&b.line_key()));
    items
}
