// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bundled static catalog data.
//!
//! The shapes match the live backend exactly, so the same rendering code consumes both.
//! The catalog serves two purposes: it is the explicit fallback for catalog queries when
//! the backend is degraded, and the primary data source in
//! [`DataMode::Local`][crate::DataMode::Local] (offline/dev mode).

use std::sync::LazyLock;

use crate::model::{Category, Credentials, OrderConfirmation, OrderDraft, Product, ProductFilter, ProductVariant, Session};

static CATEGORIES: LazyLock<Vec<Category>> = LazyLock::new(|| {
    [
        ("coats", "Coats & Jackets"),
        ("knitwear", "Knitwear"),
        ("denim", "Denim"),
        ("accessories", "Accessories"),
    ]
    .into_iter()
    .map(|(id, name)| Category {
        id: id.to_string(),
        name: name.to_string(),
    })
    .collect()
});

static CATALOG: LazyLock<Vec<Product>> = LazyLock::new(|| {
    vec![
        product("7", "Wool Trench Coat", "coats", 18_900, true, &[("7-blue", "navy", "m"), ("7-camel", "camel", "l")]),
        product("9", "Cashmere Crewneck", "knitwear", 14_500, true, &[("9-red", "burgundy", "s"), ("9-grey", "grey", "m")]),
        product("12", "Selvedge Straight Jean", "denim", 9_800, false, &[("12-indigo", "indigo", "31"), ("12-black", "black", "32")]),
        product("23", "Merino Cardigan", "knitwear", 11_200, false, &[("23-cream", "cream", "m")]),
        product("42", "Quilted Liner Jacket", "coats", 12_400, true, &[("42-olive", "olive", "m"), ("42-black", "black", "l")]),
        product("57", "Silk Twill Scarf", "accessories", 5_600, false, &[("57-print", "floral", "one-size")]),
        product("61", "Raw Denim Trucker", "denim", 13_700, true, &[("61-indigo", "indigo", "m")]),
        product("88", "Leather Belt", "accessories", 4_900, false, &[("88-tan", "tan", "85"), ("88-black", "black", "90")]),
    ]
});

fn product(id: &str, name: &str, category: &str, price_cents: u32, featured: bool, variants: &[(&str, &str, &str)]) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        price_cents,
        featured,
        variants: variants
            .iter()
            .map(|(id, color, size)| ProductVariant {
                id: (*id).to_string(),
                color: (*color).to_string(),
                size: (*size).to_string(),
                in_stock: true,
            })
            .collect(),
    }
}

/// Returns every bundled product.
#[must_use]
pub fn products() -> &'static [Product] {
    &CATALOG
}

/// Returns the bundled product with the given id.
#[must_use]
pub fn product_by_id(id: &str) -> Option<&'static Product> {
    CATALOG.iter().find(|product| product.id == id)
}

/// Returns the bundled products satisfying `filter`.
#[must_use]
pub fn filtered(filter: &ProductFilter) -> Vec<Product> {
    CATALOG.iter().filter(|product| filter.accepts(product)).cloned().collect()
}

/// Returns the bundled featured products.
#[must_use]
pub fn featured() -> Vec<Product> {
    CATALOG.iter().filter(|product| product.featured).cloned().collect()
}

/// Returns the bundled categories.
#[must_use]
pub fn categories() -> &'static [Category] {
    &CATEGORIES
}

/// Fabricates a session for offline/dev mode.
pub(crate) fn local_session(credentials: &Credentials) -> Session {
    let user_id = credentials.email.split('@').next().unwrap_or("shopper").to_string();
    Session {
        token: format!("local-token-{user_id}"),
        display_name: user_id.clone(),
        user_id,
    }
}

/// Fabricates an order confirmation for offline/dev mode.
pub(crate) fn local_confirmation(draft: &OrderDraft) -> OrderConfirmation {
    OrderConfirmation {
        order_id: format!("local-order-{}", draft.user_id),
        total_cents: draft.total_cents,
        status: "confirmed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique() {
        let mut ids: Vec<&str> = CATALOG.iter().map(|product| product.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), CATALOG.len());
    }

    #[test]
    fn every_product_belongs_to_a_known_category() {
        for item in products() {
            assert!(
                categories().iter().any(|category| category.id == item.category),
                "product {} has unknown category {}",
                item.id,
                item.category
            );
        }
    }

    #[test]
    fn filtering_by_category_narrows_the_set() {
        let coats = filtered(&ProductFilter {
            category: Some("coats".into()),
            search: None,
        });
        assert!(!coats.is_empty());
        assert!(coats.iter().all(|product| product.category == "coats"));
        assert!(coats.len() < products().len());
    }

    #[test]
    fn featured_products_are_marked_featured() {
        let rail = featured();
        assert!(!rail.is_empty());
        assert!(rail.iter().all(|product| product.featured));
    }

    #[test]
    fn lookup_by_id_finds_bundled_products() {
        assert_eq!(product_by_id("42").map(|product| product.name.as_str()), Some("Quilted Liner Jacket"));
        assert_eq!(product_by_id("999"), None);
    }
}
