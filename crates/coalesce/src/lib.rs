// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Collapses concurrent identical requests into a single execution.
//!
//! When multiple parts of a UI ask for the same data at the same time — two widgets
//! rendering the featured-products rail, a double-clicked button — only the first caller
//! (the "leader") performs the network call while the others (the "followers") wait and
//! receive a clone of the same result. Identity is established by a [`Signature`] computed
//! from the request's method, path, and a canonical serialization of its body.
//!
//! On top of the in-flight map sits a short-lived response cache: a successful result is
//! kept for a TTL scaled by the request's [`Priority`], and repeats within that window are
//! served without touching the network at all.
//!
//! # Invariants
//!
//! - **At-most-one concurrent execution per signature.** Callers that arrive while a
//!   request is in flight never issue a second network call.
//! - **Shared outcome.** Every collapsed caller receives the same resolved value, or the
//!   same error when the shared execution fails.
//! - **Failures are not cached.** A failed execution is removed from the in-flight map so
//!   the next call retries instead of replaying the failure.
//!
//! # Examples
//!
//! ```
//! use coalesce::{DedupOptions, Deduplicator, RequestShape};
//! use sundial::Clock;
//!
//! # futures::executor::block_on(async {
//! let clock = Clock::new();
//! let dedup: Deduplicator<String, String> = Deduplicator::new(DedupOptions::default(), &clock);
//!
//! let shape = RequestShape::get("/products/featured");
//! let first = dedup.execute(&shape, || async { Ok("catalog".to_string()) }).await;
//! assert_eq!(first.as_deref(), Ok("catalog"));
//!
//! // Served from the response cache; the closure does not run.
//! let repeat = dedup
//!     .execute(&shape, || async { unreachable!("cache hit") })
//!     .await;
//! assert_eq!(repeat.as_deref(), Ok("catalog"));
//! # });
//! ```

mod dedup;
mod shape;

pub use dedup::{DedupMetrics, DedupOptions, Deduplicator};
pub use shape::{Priority, RequestShape, Signature};
