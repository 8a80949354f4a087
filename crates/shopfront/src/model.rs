// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

/// A sellable product with its variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Stable product identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category identifier, see [`Category`].
    pub category: String,
    /// Unit price in cents.
    pub price_cents: u32,
    /// Purchasable variants (size/color combinations).
    pub variants: Vec<ProductVariant>,
    /// Whether the product appears in the featured rail.
    pub featured: bool,
}

/// One purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    /// Stable variant identifier.
    pub id: String,
    /// Color name.
    pub color: String,
    /// Size label.
    pub size: String,
    /// Whether the variant can currently be ordered.
    pub in_stock: bool,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Stable category identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Narrowing criteria for catalog queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    /// Restrict to one category.
    pub category: Option<String>,
    /// Free-text search over product names.
    pub search: Option<String>,
}

impl ProductFilter {
    /// Renders the filter as a URL query string (empty for the unfiltered catalog).
    #[must_use]
    pub fn query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(category) = &self.category {
            parts.push(format!("category={category}"));
        }
        if let Some(search) = &self.search {
            parts.push(format!("search={search}"));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("?{}", parts.join("&"))
        }
    }

    /// Renders the filter as a fallback-cache key suffix.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "products:{}:{}",
            self.category.as_deref().unwrap_or("all"),
            self.search.as_deref().unwrap_or("")
        )
    }

    /// Returns `true` when `product` satisfies the filter.
    #[must_use]
    pub fn accepts(&self, product: &Product) -> bool {
        if let Some(category) = &self.category
            && product.category != *category
        {
            return false;
        }
        if let Some(search) = &self.search
            && !product.name.to_lowercase().contains(&search.to_lowercase())
        {
            return false;
        }
        true
    }
}

/// Login credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// A new account registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
    /// Name shown in the UI.
    pub display_name: String,
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// The authenticated user.
    pub user_id: String,
    /// Name shown in the UI.
    pub display_name: String,
}

/// One line of a server-side cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The product in the cart.
    pub product_id: String,
    /// The chosen variant.
    pub variant_id: String,
    /// Units of the variant.
    pub quantity: u32,
}

/// A user's cart as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    /// The cart's owner.
    pub user_id: String,
    /// The cart's line items.
    pub lines: Vec<CartLine>,
}

/// An order about to be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    /// The ordering user.
    pub user_id: String,
    /// The purchased lines.
    pub lines: Vec<CartLine>,
    /// Total in cents, as computed by the cart UI.
    pub total_cents: u64,
}

/// The backend's acknowledgement of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    /// Identifier of the created order.
    pub order_id: String,
    /// Charged total in cents.
    pub total_cents: u64,
    /// Initial order status.
    pub status: String,
}

/// One entry of a user's order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    /// Identifier of the order.
    pub order_id: String,
    /// When the order was placed, in epoch milliseconds.
    pub placed_at_ms: u64,
    /// Charged total in cents.
    pub total_cents: u64,
    /// Current order status.
    pub status: String,
}

/// Admin input for creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    /// Display name.
    pub name: String,
    /// Category identifier.
    pub category: String,
    /// Unit price in cents.
    pub price_cents: u32,
    /// Purchasable variants.
    pub variants: Vec<ProductVariant>,
    /// Whether the product appears in the featured rail.
    pub featured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, category: &str) -> Product {
        Product {
            id: "1".into(),
            name: name.into(),
            category: category.into(),
            price_cents: 100,
            variants: Vec::new(),
            featured: false,
        }
    }

    #[test]
    fn filter_query_renders_all_combinations() {
        assert_eq!(ProductFilter::default().query(), "");

        let filter = ProductFilter {
            category: Some("coats".into()),
            search: Some("wool".into()),
        };
        assert_eq!(filter.query(), "?category=coats&search=wool");
    }

    #[test]
    fn filter_accepts_by_category_and_search() {
        let filter = ProductFilter {
            category: Some("coats".into()),
            search: Some("WOOL".into()),
        };

        assert!(filter.accepts(&product("Wool Trench Coat", "coats")));
        assert!(!filter.accepts(&product("Wool Scarf", "accessories")));
        assert!(!filter.accepts(&product("Denim Jacket", "coats")));
    }

    #[test]
    fn cache_keys_distinguish_filters() {
        let all = ProductFilter::default();
        let coats = ProductFilter {
            category: Some("coats".into()),
            search: None,
        };
        assert_ne!(all.cache_key(), coats.cache_key());
    }
}
