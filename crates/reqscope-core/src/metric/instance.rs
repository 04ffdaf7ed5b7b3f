//! A descriptor bound to a live collector.
//!
//! Every recording call checks the kind tag first (`WrongKind`), then that
//! the bound collector agrees with the tag (`VectorTypeMismatch`), then the
//! label arity, then the value (`NonFiniteValue`, and `NegativeCounterDelta`
//! for counters), and only then touches the collector.

use std::fmt::Write;
use std::sync::{PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::metric::vec::{
    CounterVec, GaugeVec, HistogramSnapshot, HistogramVec, SummarySnapshot, SummaryVec,
};
use crate::metric::{MetricDescriptor, MetricKind};

/// The labeled collector behind a metric.
#[derive(Debug)]
pub enum Collector {
    Counter(CounterVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec),
    Summary(SummaryVec),
}

impl Collector {
    /// Build the collector a descriptor asks for.
    pub fn for_descriptor(desc: &MetricDescriptor) -> Self {
        match desc.kind {
            MetricKind::Counter => Collector::Counter(CounterVec::default()),
            MetricKind::Gauge => Collector::Gauge(GaugeVec::default()),
            MetricKind::Histogram => Collector::Histogram(HistogramVec::new(desc.buckets.clone())),
            MetricKind::Summary => Collector::Summary(SummaryVec::new(desc.objectives.clone())),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Collector::Counter(_) => MetricKind::Counter,
            Collector::Gauge(_) => MetricKind::Gauge,
            Collector::Histogram(_) => MetricKind::Histogram,
            Collector::Summary(_) => MetricKind::Summary,
        }
    }
}

/// Read-side view of one series.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Counter(f64),
    Gauge(f64),
    Histogram(HistogramSnapshot),
    Summary(SummarySnapshot),
}

/// A registered metric.
#[derive(Debug)]
pub struct Metric {
    desc: MetricDescriptor,
    display_name: RwLock<String>,
    collector: Collector,
}

impl Metric {
    pub(crate) fn new(desc: MetricDescriptor) -> Self {
        let collector = Collector::for_descriptor(&desc);
        Self::with_collector(desc, collector)
    }

    pub(crate) fn with_collector(desc: MetricDescriptor, collector: Collector) -> Self {
        Self {
            display_name: RwLock::new(desc.name.clone()),
            desc,
            collector,
        }
    }

    /// Name the metric was registered (and is looked up) under.
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    /// Name shown in the exposition; differs from `name()` after a
    /// prefix/suffix rewrite.
    pub fn display_name(&self) -> String {
        self.display_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn rewrite_display_name(&self, f: impl FnOnce(&str) -> String) {
        let mut name = self
            .display_name
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *name = f(&name);
    }

    pub fn kind(&self) -> MetricKind {
        self.desc.kind
    }

    pub fn descriptor(&self) -> &MetricDescriptor {
        &self.desc
    }

    /// Increment a counter or gauge series by 1.
    pub fn inc(&self, labels: &[&str]) -> Result<()> {
        self.add(labels, 1.0)
    }

    /// Add `value` to a counter or gauge series.
    pub fn add(&self, labels: &[&str], value: f64) -> Result<()> {
        match (self.kind(), &self.collector) {
            (MetricKind::Counter, Collector::Counter(vec)) => {
                self.check_labels(labels)?;
                self.check_finite(value)?;
                if value < 0.0 {
                    return Err(Error::NegativeCounterDelta {
                        name: self.display_name(),
                        delta: value,
                    });
                }
                vec.add(labels, value);
                Ok(())
            }
            (MetricKind::Gauge, Collector::Gauge(vec)) => {
                self.check_labels(labels)?;
                self.check_finite(value)?;
                vec.add(labels, value);
                Ok(())
            }
            (MetricKind::Counter | MetricKind::Gauge, _) => {
                Err(Error::VectorTypeMismatch(self.display_name()))
            }
            (actual, _) => Err(self.wrong_kind(actual, "counter or gauge")),
        }
    }

    /// Record one observation into a histogram or summary series.
    pub fn observe(&self, labels: &[&str], value: f64) -> Result<()> {
        match (self.kind(), &self.collector) {
            (MetricKind::Histogram, Collector::Histogram(vec)) => {
                self.check_labels(labels)?;
                self.check_finite(value)?;
                vec.observe(labels, value);
                Ok(())
            }
            (MetricKind::Summary, Collector::Summary(vec)) => {
                self.check_labels(labels)?;
                self.check_finite(value)?;
                vec.observe(labels, value);
                Ok(())
            }
            (MetricKind::Histogram | MetricKind::Summary, _) => {
                Err(Error::VectorTypeMismatch(self.display_name()))
            }
            (actual, _) => Err(self.wrong_kind(actual, "histogram or summary")),
        }
    }

    /// Set a gauge series to exactly `value`.
    pub fn set_gauge_value(&self, labels: &[&str], value: f64) -> Result<()> {
        match (self.kind(), &self.collector) {
            (MetricKind::Gauge, Collector::Gauge(vec)) => {
                self.check_labels(labels)?;
                self.check_finite(value)?;
                vec.set(labels, value);
                Ok(())
            }
            (MetricKind::Gauge, _) => Err(Error::VectorTypeMismatch(self.display_name())),
            (actual, _) => Err(self.wrong_kind(actual, "gauge")),
        }
    }

    /// Current state of the series selected by `labels`, or `None` if it has
    /// never been recorded.
    pub fn sample(&self, labels: &[&str]) -> Option<Sample> {
        match &self.collector {
            Collector::Counter(vec) => vec.get(labels).map(Sample::Counter),
            Collector::Gauge(vec) => vec.get(labels).map(Sample::Gauge),
            Collector::Histogram(vec) => vec.get(labels).map(Sample::Histogram),
            Collector::Summary(vec) => vec.get(labels).map(Sample::Summary),
        }
    }

    /// Counter or gauge value of a series; `None` for other kinds or
    /// untouched series.
    pub fn value(&self, labels: &[&str]) -> Option<f64> {
        match self.sample(labels)? {
            Sample::Counter(v) | Sample::Gauge(v) => Some(v),
            _ => None,
        }
    }

    /// Append `# HELP`, `# TYPE` and every series in text format.
    pub(crate) fn render(&self, out: &mut String) {
        let name = self.display_name();
        let labels = &self.desc.labels;
        let _ = writeln!(out, "# HELP {} {}", name, escape_help(&self.desc.help));
        let _ = writeln!(out, "# TYPE {} {}", name, self.collector.kind());
        match &self.collector {
            Collector::Counter(vec) => vec.render(&name, labels, out),
            Collector::Gauge(vec) => vec.render(&name, labels, out),
            Collector::Histogram(vec) => vec.render(&name, labels, out),
            Collector::Summary(vec) => vec.render(&name, labels, out),
        }
    }

    fn check_labels(&self, labels: &[&str]) -> Result<()> {
        let expected = self.desc.labels.len();
        if labels.len() != expected {
            return Err(Error::LabelCardinality {
                name: self.display_name(),
                expected,
                got: labels.len(),
            });
        }
        Ok(())
    }

    /// NaN or an infinity would stick in the series for good.
    fn check_finite(&self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::NonFiniteValue {
                name: self.display_name(),
                value,
            });
        }
        Ok(())
    }

    fn wrong_kind(&self, actual: MetricKind, expected: &'static str) -> Error {
        Error::WrongKind {
            name: self.display_name(),
            actual,
            expected,
        }
    }
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}
