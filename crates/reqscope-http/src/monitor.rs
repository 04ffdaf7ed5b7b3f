//! Monitor: settings, the metric registry, the visitor filter, and the
//! axum wiring that puts them in front of a router.
//!
//! Configure with the setters, register metrics, then wrap in an `Arc` and
//! call one of `instrument`, `instrument_without_exposing` or `expose`.

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use reqscope_core::bloom::{DEFAULT_CAPACITY, DEFAULT_FALSE_POSITIVE_RATE};
use reqscope_core::error::Result;
use reqscope_core::metric::defaults::{DEFAULT_DURATION_BUCKETS, DEFAULT_SLOW_TIME_SECS};
use reqscope_core::metric::{Metric, MetricDescriptor, MetricRegistry};
use reqscope_core::ApproximateSet;

use crate::config::MetricsSection;
use crate::{ops, pipeline};

pub const DEFAULT_METRIC_PATH: &str = "/debug/metrics";

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub metric_path: String,
    pub slow_time_secs: u64,
    pub duration_buckets: Vec<f64>,
    pub visitor_capacity: usize,
    pub visitor_false_positive_rate: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            metric_path: DEFAULT_METRIC_PATH.into(),
            slow_time_secs: DEFAULT_SLOW_TIME_SECS,
            duration_buckets: DEFAULT_DURATION_BUCKETS.to_vec(),
            visitor_capacity: DEFAULT_CAPACITY,
            visitor_false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
        }
    }
}

impl From<&MetricsSection> for MonitorSettings {
    fn from(s: &MetricsSection) -> Self {
        Self {
            metric_path: normalize_path(&s.path),
            slow_time_secs: s.slow_time_secs,
            duration_buckets: s.duration_buckets.clone(),
            visitor_capacity: s.visitor_filter.capacity,
            visitor_false_positive_rate: s.visitor_filter.false_positive_rate,
        }
    }
}

#[derive(Debug)]
pub struct Monitor {
    settings: MonitorSettings,
    registry: MetricRegistry,
    visitors: ApproximateSet,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(MonitorSettings::default())
    }
}

impl Monitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self::with_registry(settings, MetricRegistry::new())
    }

    /// Use a caller-built registry, e.g. one sharing a collector registry
    /// with other monitors.
    pub fn with_registry(mut settings: MonitorSettings, registry: MetricRegistry) -> Self {
        settings.metric_path = normalize_path(&settings.metric_path);
        let visitors = ApproximateSet::new(
            settings.visitor_capacity,
            settings.visitor_false_positive_rate,
        );
        Self {
            settings,
            registry,
            visitors,
        }
    }

    /// Build a fully registered monitor from the `metrics` config section:
    /// defaults, custom metrics, then prefix/suffix.
    pub fn from_config(section: &MetricsSection) -> Result<Self> {
        let monitor = Self::new(MonitorSettings::from(section));
        monitor.register_default_metrics()?;
        for custom in &section.custom {
            monitor.add_metric(custom.to_descriptor()?)?;
        }
        if !section.prefix.is_empty() {
            monitor.set_prefix(&section.prefix);
        }
        if !section.suffix.is_empty() {
            monitor.set_suffix(&section.suffix);
        }
        Ok(monitor)
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn metric_path(&self) -> &str {
        &self.settings.metric_path
    }

    pub fn slow_time_secs(&self) -> u64 {
        self.settings.slow_time_secs
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn visitors(&self) -> &ApproximateSet {
        &self.visitors
    }

    /// Path the exposition is served on. A missing leading `/` is added.
    pub fn set_metric_path(&mut self, path: &str) -> &mut Self {
        self.settings.metric_path = normalize_path(path);
        self
    }

    /// Slow-request threshold in whole seconds.
    pub fn set_slow_time(&mut self, secs: u64) -> &mut Self {
        self.settings.slow_time_secs = secs;
        self
    }

    /// Duration histogram buckets. Only affects a later
    /// `register_default_metrics`.
    pub fn set_duration(&mut self, buckets: Vec<f64>) -> &mut Self {
        self.settings.duration_buckets = buckets;
        self
    }

    /// Register the seven built-in metrics with the current settings.
    /// Call exactly once.
    pub fn register_default_metrics(&self) -> Result<()> {
        self.registry.register_default_metrics(
            &self.settings.duration_buckets,
            self.settings.slow_time_secs,
        )
    }

    pub fn add_metric(&self, desc: MetricDescriptor) -> Result<Arc<Metric>> {
        self.registry.add_metric(desc)
    }

    pub fn get_metric(&self, name: &str) -> Result<Arc<Metric>> {
        self.registry.get_metric(name)
    }

    pub fn set_prefix(&self, prefix: &str) {
        self.registry.set_prefix(prefix);
    }

    pub fn set_suffix(&self, suffix: &str) {
        self.registry.set_suffix(suffix);
    }

    /// Current exposition text.
    pub fn gather(&self) -> String {
        self.registry.gather()
    }

    /// Add the exposition route and the measuring middleware.
    pub fn instrument<S>(self: &Arc<Self>, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.instrument_without_exposing(self.expose(router))
    }

    /// Add only the measuring middleware. May be applied to several routers;
    /// they all record into this monitor.
    pub fn instrument_without_exposing<S>(self: &Arc<Self>, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(
            Arc::clone(self),
            pipeline::monitor_interceptor,
        ))
    }

    /// Add only the exposition route, e.g. on a router bound to another
    /// port than the instrumented one.
    pub fn expose<S>(self: &Arc<Self>, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route(
            &self.settings.metric_path,
            get(ops::metrics).with_state(Arc::clone(self)),
        )
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
