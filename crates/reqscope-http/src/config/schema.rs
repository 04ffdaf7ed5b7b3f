use serde::Deserialize;

use reqscope_core::bloom::{DEFAULT_CAPACITY, DEFAULT_FALSE_POSITIVE_RATE, MAX_CAPACITY};
use reqscope_core::error::{Error, Result};
use reqscope_core::metric::defaults::{DEFAULT_DURATION_BUCKETS, DEFAULT_SLOW_TIME_SECS};
use reqscope_core::metric::{MetricDescriptor, MetricKind, Objective};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(Error::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.metrics.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Route the exposition is served on; excluded from measurement.
    #[serde(default = "default_metric_path")]
    pub path: String,

    /// Requests taking longer than this many whole seconds count as slow.
    #[serde(default = "default_slow_time_secs")]
    pub slow_time_secs: u64,

    /// Duration histogram bucket bounds, in seconds.
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub suffix: String,

    #[serde(default)]
    pub visitor_filter: VisitorFilterSection,

    /// Extra metrics registered next to the defaults.
    #[serde(default)]
    pub custom: Vec<CustomMetric>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            path: default_metric_path(),
            slow_time_secs: default_slow_time_secs(),
            duration_buckets: default_duration_buckets(),
            prefix: String::new(),
            suffix: String::new(),
            visitor_filter: VisitorFilterSection::default(),
            custom: Vec::new(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(Error::Config("metrics.path must start with '/'".into()));
        }
        if self.duration_buckets.is_empty() {
            return Err(Error::Config("metrics.duration_buckets must not be empty".into()));
        }
        if !self.duration_buckets.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::Config(
                "metrics.duration_buckets must be strictly ascending".into(),
            ));
        }
        self.visitor_filter.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisitorFilterSection {
    #[serde(default = "default_filter_capacity")]
    pub capacity: usize,

    #[serde(default = "default_filter_fp_rate")]
    pub false_positive_rate: f64,
}

impl Default for VisitorFilterSection {
    fn default() -> Self {
        Self {
            capacity: default_filter_capacity(),
            false_positive_rate: default_filter_fp_rate(),
        }
    }
}

impl VisitorFilterSection {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(Error::Config(format!(
                "metrics.visitor_filter.capacity must be between 1 and {MAX_CAPACITY}"
            )));
        }
        if !(self.false_positive_rate > 0.0 && self.false_positive_rate < 1.0) {
            return Err(Error::Config(
                "metrics.visitor_filter.false_positive_rate must be between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomMetric {
    pub name: String,
    /// One of counter, gauge, histogram, summary.
    pub kind: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub buckets: Vec<f64>,
    #[serde(default)]
    pub objectives: Vec<ObjectiveEntry>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectiveEntry {
    pub quantile: f64,
    pub error: f64,
}

impl CustomMetric {
    /// Build the descriptor; unknown kinds fail with `InvalidType`.
    pub fn to_descriptor(&self) -> Result<MetricDescriptor> {
        let kind: MetricKind = self.kind.parse()?;
        let desc = match kind {
            MetricKind::Counter => MetricDescriptor::counter(&self.name, &self.help),
            MetricKind::Gauge => MetricDescriptor::gauge(&self.name, &self.help),
            MetricKind::Histogram => {
                MetricDescriptor::histogram(&self.name, &self.help, self.buckets.clone())
            }
            MetricKind::Summary => MetricDescriptor::summary(
                &self.name,
                &self.help,
                self.objectives
                    .iter()
                    .map(|o| Objective::new(o.quantile, o.error))
                    .collect(),
            ),
        };
        Ok(desc.with_labels(self.labels.iter().cloned()))
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_metric_path() -> String {
    "/debug/metrics".into()
}
fn default_slow_time_secs() -> u64 {
    DEFAULT_SLOW_TIME_SECS
}
fn default_duration_buckets() -> Vec<f64> {
    DEFAULT_DURATION_BUCKETS.to_vec()
}
fn default_filter_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_filter_fp_rate() -> f64 {
    DEFAULT_FALSE_POSITIVE_RATE
}
