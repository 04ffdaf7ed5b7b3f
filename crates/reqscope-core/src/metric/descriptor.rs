//! Metric descriptors: what a metric is before it is bound to a collector.

use crate::error::{Error, Result};
use crate::metric::MetricKind;

/// One summary objective: a quantile and the rank error allowed for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    pub quantile: f64,
    pub error: f64,
}

impl Objective {
    pub fn new(quantile: f64, error: f64) -> Self {
        Self { quantile, error }
    }
}

/// Declarative description of a metric.
///
/// `labels` is positional: recording calls pass label values in the same
/// order. `buckets` is only read for histograms and `objectives` only for
/// summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub name: String,
    pub kind: MetricKind,
    pub help: String,
    pub labels: Vec<String>,
    pub buckets: Vec<f64>,
    pub objectives: Vec<Objective>,
}

impl MetricDescriptor {
    fn base(kind: MetricKind, name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            help: help.into(),
            labels: Vec::new(),
            buckets: Vec::new(),
            objectives: Vec::new(),
        }
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::base(MetricKind::Counter, name, help)
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::base(MetricKind::Gauge, name, help)
    }

    pub fn histogram(name: impl Into<String>, help: impl Into<String>, buckets: Vec<f64>) -> Self {
        Self {
            buckets,
            ..Self::base(MetricKind::Histogram, name, help)
        }
    }

    pub fn summary(
        name: impl Into<String>,
        help: impl Into<String>,
        objectives: Vec<Objective>,
    ) -> Self {
        Self {
            objectives,
            ..Self::base(MetricKind::Summary, name, help)
        }
    }

    /// Replace the label names.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Kind-specific checks (buckets, objectives) and label names.
    /// Name checks happen in the registry, before the duplicate lookup.
    pub(crate) fn validate_shape(&self) -> Result<()> {
        match self.kind {
            MetricKind::Histogram => {
                if self.buckets.is_empty() {
                    return Err(Error::MissingBuckets(self.name.clone()));
                }
                let finite = self.buckets.iter().all(|b| b.is_finite());
                let ascending = self.buckets.windows(2).all(|w| w[0] < w[1]);
                if !finite || !ascending {
                    return Err(Error::InvalidBuckets(self.name.clone()));
                }
            }
            MetricKind::Summary => {
                if self.objectives.is_empty() {
                    return Err(Error::MissingObjectives(self.name.clone()));
                }
                for o in &self.objectives {
                    let q_ok = o.quantile > 0.0 && o.quantile < 1.0;
                    let e_ok = o.error >= 0.0 && o.error < 1.0;
                    if !q_ok || !e_ok {
                        return Err(Error::InvalidObjective {
                            name: self.name.clone(),
                            quantile: o.quantile,
                            error: o.error,
                        });
                    }
                }
            }
            MetricKind::Counter | MetricKind::Gauge => {}
        }

        for (i, label) in self.labels.iter().enumerate() {
            let reserved = match self.kind {
                MetricKind::Histogram => label == "le",
                MetricKind::Summary => label == "quantile",
                _ => false,
            };
            let duplicate = self.labels[..i].contains(label);
            if reserved || duplicate || !is_valid_label_name(label) {
                return Err(Error::InvalidLabel {
                    name: self.name.clone(),
                    label: label.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Metric names follow `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let ok = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

fn is_valid_label_name(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            !label.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
