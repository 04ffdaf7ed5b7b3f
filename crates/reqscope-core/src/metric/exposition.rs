//! Collector registry for exposition.
//!
//! Holds every collector that should appear on the scrape endpoint and
//! renders them in the Prometheus text format (version 0.0.4). Collector
//! identity is the name a metric was registered under; a second collector
//! with the same identity is rejected. Several `MetricRegistry`s may share one
//! `CollectorRegistry` to be served from a single endpoint.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::metric::Metric;

/// Content type of `CollectorRegistry::gather`.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Default)]
pub struct CollectorRegistry {
    collectors: DashMap<String, Arc<Metric>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, metric: Arc<Metric>) -> Result<()> {
        match self.collectors.entry(metric.name().to_string()) {
            Entry::Occupied(e) => Err(Error::CollectorConflict(e.key().clone())),
            Entry::Vacant(e) => {
                e.insert(metric);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Render all collectors, ordered by display name.
    pub fn gather(&self) -> String {
        let mut metrics: Vec<Arc<Metric>> =
            self.collectors.iter().map(|e| Arc::clone(e.value())).collect();
        metrics.sort_by_cached_key(|m| m.display_name());

        let mut out = String::new();
        for m in metrics {
            m.render(&mut out);
        }
        out
    }
}
