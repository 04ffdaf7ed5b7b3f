//! reqscope HTTP library entry.
//!
//! Puts the core metrics behind axum: the monitor (settings, registry,
//! visitor filter), the per-request pipeline middleware, the concurrent
//! recorder, and the exposition endpoint. Consumed by the demo binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod monitor;
pub mod ops;
pub mod pipeline;
pub mod recorder;
pub mod router;

pub use monitor::{Monitor, MonitorSettings};
pub use pipeline::RequestFacts;
pub use recorder::ParallelRecorder;
