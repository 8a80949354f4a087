// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use fusebox::BreakerOptions;
use serde::{Deserialize, Serialize};

/// The coarse endpoint names circuit breakers are keyed by.
///
/// Names are deliberately low-cardinality: one breaker per failure domain, not per URL.
pub mod endpoints {
    /// Catalog reads and admin product management.
    pub const PRODUCTS: &str = "products";
    /// Login and registration.
    pub const AUTH: &str = "auth";
    /// Cart reads and writes.
    pub const CART: &str = "cart";
    /// Order placement and history.
    pub const ORDERS: &str = "orders";
}

/// Where operations get their data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataMode {
    /// Call the live backend, with static data as fallback.
    #[default]
    Live,

    /// Serve bundled static data as the primary source (offline/dev mode).
    Local,
}

/// Configuration for an [`ApiContext`][crate::ApiContext].
///
/// Deserializes with defaults for every missing field, so a config file only needs to name
/// what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL the request paths are appended to.
    pub base_url: String,

    /// Deadline applied to every network call.
    pub request_timeout: Duration,

    /// Live backend or bundled static data.
    pub data_mode: DataMode,

    /// Consecutive service faults before an endpoint's circuit opens.
    pub breaker_failure_threshold: u32,

    /// How long an open circuit waits before probing.
    pub breaker_reset_timeout: Duration,

    /// Consecutive probe successes required to close a circuit.
    pub breaker_success_threshold: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://store.example.com/api".to_string(),
            request_timeout: Duration::from_secs(10),
            data_mode: DataMode::default(),
            breaker_failure_threshold: 5,
            breaker_reset_timeout: Duration::from_secs(30),
            breaker_success_threshold: 2,
        }
    }
}

impl ApiConfig {
    /// Renders the breaker-related fields as [`BreakerOptions`].
    #[must_use]
    pub fn breaker_options(&self) -> BreakerOptions {
        BreakerOptions::new()
            .failure_threshold(self.breaker_failure_threshold)
            .reset_timeout(self.breaker_reset_timeout)
            .success_threshold(self.breaker_success_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_files_fill_in_defaults() {
        let config: ApiConfig = serde_json::from_str(r#"{"data_mode": "local"}"#).unwrap();
        assert_eq!(config.data_mode, DataMode::Local);
        assert_eq!(config.base_url, ApiConfig::default().base_url);
        assert_eq!(config.breaker_failure_threshold, 5);
    }

    #[test]
    fn breaker_options_mirror_the_config() {
        let config = ApiConfig {
            breaker_failure_threshold: 3,
            breaker_reset_timeout: Duration::from_secs(60),
            ..ApiConfig::default()
        };
        let options = config.breaker_options();
        assert_eq!(
            options,
            fusebox::BreakerOptions::new()
                .failure_threshold(3)
                .reset_timeout(Duration::from_secs(60))
                .success_threshold(2)
        );
    }
}
