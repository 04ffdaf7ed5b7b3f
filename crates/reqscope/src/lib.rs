//! Top-level facade crate for reqscope.
//!
//! Re-exports the core metrics and the HTTP layer so users can depend on a single crate.

pub mod core {
    pub use reqscope_core::*;
}

pub mod http {
    pub use reqscope_http::*;
}

pub use reqscope_core::{ApproximateSet, Error, MetricDescriptor, MetricKind, MetricRegistry, Result};
pub use reqscope_http::{Monitor, MonitorSettings, ParallelRecorder};
