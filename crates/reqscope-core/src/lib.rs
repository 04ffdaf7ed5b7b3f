//! reqscope core: typed metrics, the visitor filter, and the shared error
//! surface.
//!
//! This crate carries no transport or runtime dependencies; the HTTP
//! middleware and the concurrent recorder live in `reqscope-http`.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! Every fallible path surfaces as `Error`/`Result` so a bad recording call
//! never takes down the serving process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bloom;
pub mod error;
pub mod metric;

pub use bloom::ApproximateSet;
pub use error::{Error, ErrorCode, Result};
pub use metric::{MetricDescriptor, MetricKind, MetricRegistry};
