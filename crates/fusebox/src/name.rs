// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// Identifies an isolated circuit breaker instance.
///
/// Each unique `BreakerName` maintains its own independent circuit state, counters, and reset
/// timer. Names should be **long-lived and low-cardinality**, representing distinct failure
/// domains: coarse logical endpoints such as `"products"`, `"auth"`, `"cart"`, or `"orders"`.
/// Avoid high-cardinality names like user or request identifiers; these cause unbounded
/// registry growth and prevent detection of systemic failures.
///
/// # Examples
///
/// ```
/// use fusebox::BreakerName;
///
/// let name = BreakerName::from("products");
/// assert_eq!(name.as_str(), "products");
/// assert_eq!(name.to_string(), "products");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakerName(Cow<'static, str>);

impl BreakerName {
    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for BreakerName {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for BreakerName {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl Display for BreakerName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BreakerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_and_owned_names_compare_equal() {
        let fixed = BreakerName::from("cart");
        let owned = BreakerName::from("cart".to_string());
        assert_eq!(fixed, owned);
    }

    #[test]
    fn name_is_usable_as_map_key() {
        let mut seen = std::collections::HashMap::new();
        seen.insert(BreakerName::from("auth"), 1);
        assert_eq!(seen.get(&BreakerName::from("auth".to_string())), Some(&1));
    }
}
