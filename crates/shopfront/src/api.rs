// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use bytes::Bytes;
use coalesce::{Priority, RequestShape};
use fusebox::{BreakerError, Fallback};
use http::Method;
use serde::de::DeserializeOwned;

use crate::catalog;
use crate::config::{DataMode, endpoints};
use crate::context::ApiContext;
use crate::error::{self, ApiError};
use crate::model::{
    CartLine, CartView, Category, Credentials, NewUser, OrderConfirmation, OrderDraft, OrderSummary, Product,
    ProductDraft, ProductFilter, Session,
};
use crate::transport::{self, Transport, TransportError};

/// The storefront's business operations, composed over the resilience stack.
///
/// Every operation follows the same shape: build the live operation (or serve bundled
/// data in [`DataMode::Local`]), pick a fallback appropriate for the operation's contract,
/// hand both to the endpoint's circuit breaker, translate errors, and remember successful
/// payloads in the fallback cache.
///
/// Queries (`products`, `cart`, `orders`, …) degrade to empty results once every fallback
/// option is exhausted. Mutations (`login`, `add_to_cart`, `create_order`, …) never
/// receive fallbacks: their failures always reach the caller so the UI can offer a retry.
pub struct ApiClient<T> {
    transport: Arc<T>,
    context: Arc<ApiContext>,
}

impl<T> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            context: Arc::clone(&self.context),
        }
    }
}

impl<T> Debug for ApiClient<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("context", &self.context).finish_non_exhaustive()
    }
}

impl<T: Transport> ApiClient<T> {
    /// Creates a client from a transport and an explicitly constructed context.
    #[must_use]
    pub fn new(transport: T, context: ApiContext) -> Self {
        Self {
            transport: Arc::new(transport),
            context: Arc::new(context),
        }
    }

    /// Returns the shared resilience context.
    #[must_use]
    pub fn context(&self) -> &ApiContext {
        &self.context
    }

    // ---- catalog ----------------------------------------------------------------

    /// Lists products matching `filter`.
    ///
    /// Degrades to the bundled catalog when the endpoint is failing, and to an empty list
    /// as the last resort.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] for 4xx rejections; service failures degrade instead.
    pub async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>, ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(catalog::filtered(filter));
        }

        let shape = RequestShape::get(format!("/products{}", filter.query()));
        let breaker = self.context.registry.get(endpoints::PRODUCTS);
        let result = breaker
            .execute(
                || self.fetch::<Vec<Product>>(endpoints::PRODUCTS, shape),
                Fallback::value(catalog::filtered(filter)),
            )
            .await;

        match result {
            Ok(products) => {
                self.context.remember(&filter.cache_key(), &products);
                Ok(products)
            }
            Err(rejected) => self.degrade_query(rejected, endpoints::PRODUCTS, Vec::new()),
        }
    }

    /// Fetches a single product by id, `None` when it does not exist.
    ///
    /// When the endpoint is failing, the bundled product is served first and the last
    /// known good payload second.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] for 4xx rejections other than 404; service failures
    /// degrade instead.
    pub async fn product_by_id(&self, id: &str) -> Result<Option<Product>, ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(catalog::product_by_id(id).cloned());
        }

        let cache_key = format!("product:{id}");
        let shape = RequestShape::get(format!("/products/{id}")).priority(Priority::High);

        // Fallback priority: explicit bundled data beats the fallback cache.
        let fallback = match catalog::product_by_id(id) {
            Some(bundled) => Fallback::value(Some(bundled.clone())),
            None => match self.context.cached::<Product>(&cache_key) {
                Some(last_known) => Fallback::value(Some(last_known)),
                None => Fallback::None,
            },
        };

        let breaker = self.context.registry.get(endpoints::PRODUCTS);
        let result = breaker.execute(|| self.fetch_optional_product(shape), fallback).await;

        match result {
            Ok(found) => {
                if let Some(product) = &found {
                    self.context.remember(&cache_key, product);
                }
                Ok(found)
            }
            Err(rejected) => self.degrade_query(rejected, endpoints::PRODUCTS, None),
        }
    }

    /// Lists the featured products for the landing rail.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] for 4xx rejections; service failures degrade instead.
    pub async fn featured_products(&self) -> Result<Vec<Product>, ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(catalog::featured());
        }

        let shape = RequestShape::get("/products/featured").priority(Priority::High);
        let breaker = self.context.registry.get(endpoints::PRODUCTS);
        let result = breaker
            .execute(
                || self.fetch::<Vec<Product>>(endpoints::PRODUCTS, shape),
                Fallback::value(catalog::featured()),
            )
            .await;

        match result {
            Ok(products) => {
                self.context.remember("products:featured", &products);
                Ok(products)
            }
            Err(rejected) => self.degrade_query(rejected, endpoints::PRODUCTS, Vec::new()),
        }
    }

    /// Lists the store's categories.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] for 4xx rejections; service failures degrade instead.
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(catalog::categories().to_vec());
        }

        let shape = RequestShape::get("/categories").priority(Priority::High);
        let breaker = self.context.registry.get(endpoints::PRODUCTS);
        let result = breaker
            .execute(
                || self.fetch::<Vec<Category>>(endpoints::PRODUCTS, shape),
                Fallback::value(catalog::categories().to_vec()),
            )
            .await;

        match result {
            Ok(categories) => {
                self.context.remember("categories", &categories);
                Ok(categories)
            }
            Err(rejected) => self.degrade_query(rejected, endpoints::PRODUCTS, Vec::new()),
        }
    }

    // ---- auth -------------------------------------------------------------------

    /// Logs a user in. A mutation: failures always propagate.
    ///
    /// # Errors
    ///
    /// Returns the translated [`ApiError`]; there is no fallback for authentication.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(catalog::local_session(credentials));
        }

        let body = serde_json::to_value(credentials).map_err(|_| ApiError::Decode {
            endpoint: endpoints::AUTH,
        })?;
        let shape = RequestShape::new(Method::POST, "/auth/login").json_body(body);
        let breaker = self.context.registry.get(endpoints::AUTH);

        breaker
            .execute(|| self.fetch::<Session>(endpoints::AUTH, shape), Fallback::None)
            .await
            .map_err(|rejected| error::from_breaker(rejected, endpoints::AUTH))
    }

    /// Registers a new account. A mutation: failures always propagate.
    ///
    /// # Errors
    ///
    /// Returns the translated [`ApiError`]; there is no fallback for registration.
    pub async fn register(&self, new_user: &NewUser) -> Result<Session, ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(catalog::local_session(&Credentials {
                email: new_user.email.clone(),
                password: new_user.password.clone(),
            }));
        }

        let body = serde_json::to_value(new_user).map_err(|_| ApiError::Decode {
            endpoint: endpoints::AUTH,
        })?;
        let shape = RequestShape::new(Method::POST, "/auth/register").json_body(body);
        let breaker = self.context.registry.get(endpoints::AUTH);

        breaker
            .execute(|| self.fetch::<Session>(endpoints::AUTH, shape), Fallback::None)
            .await
            .map_err(|rejected| error::from_breaker(rejected, endpoints::AUTH))
    }

    // ---- cart -------------------------------------------------------------------

    /// Fetches a user's cart, falling back to the last known good copy and finally to an
    /// empty cart.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] for 4xx rejections; service failures degrade instead.
    pub async fn cart(&self, user_id: &str) -> Result<CartView, ApiError> {
        let empty = CartView {
            user_id: user_id.to_string(),
            lines: Vec::new(),
        };
        if self.context.config.data_mode == DataMode::Local {
            return Ok(empty);
        }

        let cache_key = format!("cart:{user_id}");
        let shape = RequestShape::get(format!("/cart?user={user_id}"));
        let fallback = match self.context.cached::<CartView>(&cache_key) {
            Some(last_known) => Fallback::value(last_known),
            None => Fallback::None,
        };

        let breaker = self.context.registry.get(endpoints::CART);
        let result = breaker
            .execute(|| self.fetch::<CartView>(endpoints::CART, shape), fallback)
            .await;

        match result {
            Ok(view) => {
                self.context.remember(&cache_key, &view);
                Ok(view)
            }
            Err(rejected) => self.degrade_query(rejected, endpoints::CART, empty),
        }
    }

    /// Adds a line to a user's cart. A mutation: failures always propagate, and stale
    /// `/cart` reads are invalidated on success.
    ///
    /// # Errors
    ///
    /// Returns the translated [`ApiError`]; a silent fallback would fake a write.
    pub async fn add_to_cart(&self, user_id: &str, line: &CartLine) -> Result<CartView, ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(CartView {
                user_id: user_id.to_string(),
                lines: vec![line.clone()],
            });
        }

        let body = serde_json::json!({ "user_id": user_id, "line": line });
        let shape = RequestShape::new(Method::POST, "/cart/items").json_body(body);
        let breaker = self.context.registry.get(endpoints::CART);

        let view = breaker
            .execute(|| self.fetch::<CartView>(endpoints::CART, shape), Fallback::None)
            .await
            .map_err(|rejected| error::from_breaker(rejected, endpoints::CART))?;

        self.context.dedup.invalidate_matching("/cart");
        self.context.remember(&format!("cart:{user_id}"), &view);
        Ok(view)
    }

    // ---- orders -----------------------------------------------------------------

    /// Lists a user's order history, degrading to the cached copy and finally to empty.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] for 4xx rejections; service failures degrade instead.
    pub async fn orders(&self, user_id: &str) -> Result<Vec<OrderSummary>, ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(Vec::new());
        }

        let cache_key = format!("orders:{user_id}");
        let shape = RequestShape::get(format!("/orders?user={user_id}"));
        let fallback = match self.context.cached::<Vec<OrderSummary>>(&cache_key) {
            Some(last_known) => Fallback::value(last_known),
            None => Fallback::None,
        };

        let breaker = self.context.registry.get(endpoints::ORDERS);
        let result = breaker
            .execute(|| self.fetch::<Vec<OrderSummary>>(endpoints::ORDERS, shape), fallback)
            .await;

        match result {
            Ok(history) => {
                self.context.remember(&cache_key, &history);
                Ok(history)
            }
            Err(rejected) => self.degrade_query(rejected, endpoints::ORDERS, Vec::new()),
        }
    }

    /// Places an order. A mutation with **no fallback of any kind**: fabricating success
    /// for a financial transaction would be a correctness violation, so an open circuit
    /// or a failed call always surfaces for the UI to offer a retry.
    ///
    /// # Errors
    ///
    /// Returns the translated [`ApiError`], including
    /// [`ApiError::Unavailable`] when the `orders` circuit is open.
    pub async fn create_order(&self, draft: &OrderDraft) -> Result<OrderConfirmation, ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(catalog::local_confirmation(draft));
        }

        let body = serde_json::to_value(draft).map_err(|_| ApiError::Decode {
            endpoint: endpoints::ORDERS,
        })?;
        let shape = RequestShape::new(Method::POST, "/orders").json_body(body);
        let breaker = self.context.registry.get(endpoints::ORDERS);

        let confirmation = breaker
            .execute(
                || self.fetch::<OrderConfirmation>(endpoints::ORDERS, shape),
                Fallback::None,
            )
            .await
            .map_err(|rejected| error::from_breaker(rejected, endpoints::ORDERS))?;

        // The cart was consumed and the history grew; both must refetch.
        self.context.dedup.invalidate_matching("/cart");
        self.context.dedup.invalidate_matching("/orders");
        self.context.larder.remove(&format!("cart:{}", draft.user_id));
        Ok(confirmation)
    }

    // ---- admin product management -----------------------------------------------

    /// Creates a product. A mutation: failures always propagate.
    ///
    /// # Errors
    ///
    /// Returns the translated [`ApiError`].
    pub async fn create_product(&self, draft: &ProductDraft) -> Result<Product, ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(Product {
                id: format!("local-{}", draft.name.to_lowercase().replace(' ', "-")),
                name: draft.name.clone(),
                category: draft.category.clone(),
                price_cents: draft.price_cents,
                variants: draft.variants.clone(),
                featured: draft.featured,
            });
        }

        let body = serde_json::to_value(draft).map_err(|_| ApiError::Decode {
            endpoint: endpoints::PRODUCTS,
        })?;
        let shape = RequestShape::new(Method::POST, "/products").json_body(body);
        let breaker = self.context.registry.get(endpoints::PRODUCTS);

        let product = breaker
            .execute(|| self.fetch::<Product>(endpoints::PRODUCTS, shape), Fallback::None)
            .await
            .map_err(|rejected| error::from_breaker(rejected, endpoints::PRODUCTS))?;

        self.context.dedup.invalidate_matching("/products");
        self.context.remember(&format!("product:{}", product.id), &product);
        Ok(product)
    }

    /// Replaces a product. A mutation: failures always propagate.
    ///
    /// # Errors
    ///
    /// Returns the translated [`ApiError`].
    pub async fn update_product(&self, product: &Product) -> Result<Product, ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(product.clone());
        }

        let body = serde_json::to_value(product).map_err(|_| ApiError::Decode {
            endpoint: endpoints::PRODUCTS,
        })?;
        let shape = RequestShape::new(Method::PUT, format!("/products/{}", product.id)).json_body(body);
        let breaker = self.context.registry.get(endpoints::PRODUCTS);

        let updated = breaker
            .execute(|| self.fetch::<Product>(endpoints::PRODUCTS, shape), Fallback::None)
            .await
            .map_err(|rejected| error::from_breaker(rejected, endpoints::PRODUCTS))?;

        self.context.dedup.invalidate_matching("/products");
        self.context.remember(&format!("product:{}", updated.id), &updated);
        Ok(updated)
    }

    /// Deletes a product. A mutation: failures always propagate.
    ///
    /// # Errors
    ///
    /// Returns the translated [`ApiError`].
    pub async fn delete_product(&self, id: &str) -> Result<(), ApiError> {
        if self.context.config.data_mode == DataMode::Local {
            return Ok(());
        }

        let shape = RequestShape::new(Method::DELETE, format!("/products/{id}"));
        let breaker = self.context.registry.get(endpoints::PRODUCTS);

        breaker
            .execute(|| self.send_empty(endpoints::PRODUCTS, shape), Fallback::None)
            .await
            .map_err(|rejected| error::from_breaker(rejected, endpoints::PRODUCTS))?;

        self.context.dedup.invalidate_matching("/products");
        self.context.larder.remove(&format!("product:{id}"));
        Ok(())
    }

    // ---- plumbing ---------------------------------------------------------------

    /// Runs the live network call for `shape` through the deduplicator.
    async fn send_deduplicated(&self, endpoint: &'static str, shape: &RequestShape) -> Result<Bytes, ApiError> {
        self.context
            .dedup
            .execute(shape, || async {
                let url = format!("{}{}", self.context.config.base_url, shape.path());
                let request = transport::json_request(shape.method().clone(), &url, shape.json(), endpoint)?;

                let response = self
                    .transport
                    .send(request, self.context.config.request_timeout)
                    .await
                    .map_err(|failure| match failure {
                        TransportError::Timeout => ApiError::Timeout { endpoint },
                        TransportError::Network(detail) => ApiError::Network { endpoint, detail },
                    })?;

                if let Some(rejection) = error::error_for_status(response.status(), endpoint, response.body()) {
                    return Err(rejection);
                }
                Ok(response.into_body())
            })
            .await
    }

    async fn fetch<P: DeserializeOwned>(&self, endpoint: &'static str, shape: RequestShape) -> Result<P, ApiError> {
        let payload = self.send_deduplicated(endpoint, &shape).await?;
        serde_json::from_slice(&payload).map_err(|_| ApiError::Decode { endpoint })
    }

    async fn send_empty(&self, endpoint: &'static str, shape: RequestShape) -> Result<(), ApiError> {
        self.send_deduplicated(endpoint, &shape).await.map(|_| ())
    }

    async fn fetch_optional_product(&self, shape: RequestShape) -> Result<Option<Product>, ApiError> {
        match self.fetch::<Product>(endpoints::PRODUCTS, shape).await {
            Ok(product) => Ok(Some(product)),
            Err(ApiError::Client { status: 404, .. }) => Ok(None),
            Err(failure) => Err(failure),
        }
    }

    /// Applies the query propagation policy: caller faults surface, everything else
    /// degrades to the operation's empty shape.
    fn degrade_query<P>(&self, rejected: BreakerError<ApiError>, endpoint: &'static str, empty: P) -> Result<P, ApiError> {
        match error::from_breaker(rejected, endpoint) {
            caller_fault @ ApiError::Client { .. } => Err(caller_fault),
            failure => {
                tracing::warn!(endpoint, error = %failure, "query degraded to empty result");
                Ok(empty)
            }
        }
    }
}
