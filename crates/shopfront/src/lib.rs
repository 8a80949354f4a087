// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Resilient storefront API layer.
//!
//! This crate is the composition root of the resilience stack: every business operation
//! (catalog reads, login, cart writes, order placement, admin product management) runs
//! through a fixed pipeline —
//!
//! 1. the operation is keyed under a coarse endpoint name (`products`, `auth`, `cart`,
//!    `orders`) and guarded by that endpoint's [circuit breaker][fusebox],
//! 2. live network calls are [deduplicated and response-cached][coalesce],
//! 3. successful payloads are remembered in a [fallback cache][larder] under
//!    business-meaningful keys, and
//! 4. failures degrade along a fixed priority: explicit fallback (bundled
//!    [static catalog][catalog] data) ≻ last-known-good cache entry ≻ error.
//!
//! Queries prefer degrading to an empty result over failing the page; mutations never
//! receive silent fallbacks — a failed order submission must surface so the UI can offer a
//! retry.
//!
//! All shared state lives in an explicitly constructed [`ApiContext`] rather than ambient
//! module-level singletons, which keeps breaker and cache lifecycles testable.
//!
//! # Examples
//!
//! Fully local (offline/dev) mode needs no transport at all:
//!
//! ```
//! use shopfront::{ApiClient, ApiConfig, ApiContext, DataMode, NullTransport, ProductFilter};
//! use sundial::Clock;
//!
//! # futures::executor::block_on(async {
//! let clock = Clock::new();
//! let config = ApiConfig {
//!     data_mode: DataMode::Local,
//!     ..ApiConfig::default()
//! };
//! let client = ApiClient::new(NullTransport, ApiContext::new(config, &clock));
//!
//! let products = client.products(&ProductFilter::default()).await.unwrap();
//! assert!(!products.is_empty());
//! # });
//! ```

pub mod catalog;

mod api;
mod config;
mod context;
mod error;
mod model;
mod transport;
mod warming;

pub use api::ApiClient;
pub use config::{ApiConfig, DataMode, endpoints};
pub use context::{ApiContext, AvailabilityNotice, NoticeKind, ServiceHealth};
pub use error::ApiError;
pub use model::{
    CartLine, CartView, Category, Credentials, NewUser, OrderConfirmation, OrderDraft, OrderSummary, Product,
    ProductDraft, ProductFilter, ProductVariant, Session,
};
pub use transport::{NullTransport, Transport, TransportError};
pub use warming::WarmPlan;
