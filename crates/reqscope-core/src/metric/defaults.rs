//! Built-in request metrics.

use crate::error::Result;
use crate::metric::{MetricDescriptor, MetricRegistry};

pub const METRIC_REQUEST_TOTAL: &str = "http_request_total";
pub const METRIC_REQUEST_UV_TOTAL: &str = "http_request_uv_total";
pub const METRIC_URI_REQUEST_TOTAL: &str = "http_uri_request_total";
pub const METRIC_REQUEST_BODY: &str = "http_request_body_total";
pub const METRIC_RESPONSE_BODY: &str = "http_response_body_total";
pub const METRIC_REQUEST_DURATION: &str = "http_request_duration";
pub const METRIC_SLOW_REQUEST: &str = "http_slow_request_total";

/// Label names of the per-route and slow-request counters.
pub const ROUTE_LABELS: [&str; 3] = ["route", "method", "status"];

/// Default duration histogram buckets, in seconds.
pub const DEFAULT_DURATION_BUCKETS: [f64; 5] = [0.1, 0.3, 1.2, 5.0, 10.0];
/// Default slow-request threshold, in whole seconds.
pub const DEFAULT_SLOW_TIME_SECS: u64 = 5;

impl MetricRegistry {
    /// Register the seven built-in request metrics.
    ///
    /// Not idempotent: a second call fails with `DuplicateName` on the first
    /// metric, leaving the registry unchanged.
    pub fn register_default_metrics(
        &self,
        duration_buckets: &[f64],
        slow_time_secs: u64,
    ) -> Result<()> {
        let defaults = [
            MetricDescriptor::counter(METRIC_REQUEST_TOTAL, "all the server received request num."),
            MetricDescriptor::counter(METRIC_REQUEST_UV_TOTAL, "all the server received ip num."),
            MetricDescriptor::counter(
                METRIC_URI_REQUEST_TOTAL,
                "all the server received request num with every route.",
            )
            .with_labels(ROUTE_LABELS),
            MetricDescriptor::counter(
                METRIC_REQUEST_BODY,
                "the server received request body size, unit byte.",
            ),
            MetricDescriptor::counter(
                METRIC_RESPONSE_BODY,
                "the server send response body size, unit byte.",
            ),
            MetricDescriptor::histogram(
                METRIC_REQUEST_DURATION,
                "the time server took to handle the request, unit second.",
                duration_buckets.to_vec(),
            )
            .with_labels(["route"]),
            MetricDescriptor::counter(
                METRIC_SLOW_REQUEST,
                format!("the server handled slow requests counter, t={slow_time_secs}."),
            )
            .with_labels(ROUTE_LABELS),
        ];

        for desc in defaults {
            self.add_metric(desc)?;
        }
        Ok(())
    }
}
