// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};

use http::Method;
use xxhash_rust::xxh3::xxh3_64;

/// Influences how long a cached response lives and what gets evicted first under memory
/// pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Priority {
    /// Evicted first; short cache lifetime. Use for speculative or rapidly changing data.
    Low,

    /// The default.
    #[default]
    Normal,

    /// Evicted last; long cache lifetime. Use for data the UI cannot render without.
    High,
}

/// Describes a logical request for deduplication purposes.
///
/// The shape carries everything that identifies "the same request": method, path, and the
/// optional JSON body. Mutating requests participate in in-flight collapsing (a
/// double-submitted `POST` runs once) but are never served from the response cache.
///
/// # Examples
///
/// ```
/// use coalesce::{Priority, RequestShape};
/// use http::Method;
///
/// let read = RequestShape::get("/products?category=coats").priority(Priority::High);
/// assert!(read.is_cacheable());
///
/// let write = RequestShape::new(Method::POST, "/cart/items")
///     .json_body(serde_json::json!({"product_id": "7", "qty": 1}));
/// assert!(!write.is_cacheable());
/// ```
#[derive(Debug, Clone)]
pub struct RequestShape {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    priority: Priority,
}

impl RequestShape {
    /// Creates a shape for `method` on `path`.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            priority: Priority::default(),
        }
    }

    /// Creates a `GET` shape, the common case for queries.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Attaches a JSON body, included in the signature for mutating requests.
    #[must_use]
    pub fn json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the cache priority.
    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Returns the request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the cache priority.
    #[must_use]
    pub const fn cache_priority(&self) -> Priority {
        self.priority
    }

    /// Returns the JSON body, if any.
    #[must_use]
    pub const fn json(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Whether responses to this shape may be served from the cache.
    ///
    /// Only safe (`GET`/`HEAD`) requests are cacheable.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Computes the normalized signature identifying this logical request.
    #[must_use]
    pub fn signature(&self) -> Signature {
        Signature::of(self)
    }
}

/// A normalized key identifying "the same logical request".
///
/// The display form is `METHOD path`, optionally followed by a hash of the canonical body
/// encoding. Keeping the path readable lets callers invalidate by substring after a
/// mutation (for example, dropping every `/cart` read once an item was added).
///
/// Canonical body encoding relies on `serde_json`'s default map representation, which
/// orders keys, so two bodies that differ only in key order or whitespace produce the same
/// signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    fn of(shape: &RequestShape) -> Self {
        let mut text = format!("{} {}", shape.method, shape.path);
        if let Some(body) = &shape.body {
            let canonical = body.to_string();
            text.push_str(&format!(" body:{:016x}", xxh3_64(canonical.as_bytes())));
        }
        Self(text)
    }

    /// Returns the signature as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when the signature contains `pattern`.
    #[must_use]
    pub fn matches(&self, pattern: &str) -> bool {
        self.0.contains(pattern)
    }

    pub(crate) fn into_string(self) -> String {
        self.0
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
