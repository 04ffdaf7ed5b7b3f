//! Typed metrics: descriptors, labeled collectors, the registry and the
//! exposition collaborator.

pub mod defaults;
pub mod descriptor;
pub mod exposition;
pub mod instance;
pub mod kind;
pub mod registry;
pub mod vec;

pub use descriptor::{MetricDescriptor, Objective};
pub use exposition::{CollectorRegistry, TEXT_CONTENT_TYPE};
pub use instance::{Collector, Metric, Sample};
pub use kind::MetricKind;
pub use registry::MetricRegistry;
pub use vec::{HistogramSnapshot, SummarySnapshot};
