//! Name-keyed registry of metrics.
//!
//! The registry is an explicit object (one per monitor), never process-wide
//! state, so independent pipelines can reuse metric names.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::metric::descriptor::validate_name;
use crate::metric::{CollectorRegistry, Metric, MetricDescriptor};

#[derive(Debug)]
pub struct MetricRegistry {
    metrics: DashMap<String, Arc<Metric>>,
    exposition: Arc<CollectorRegistry>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    /// Registry with its own collector registry.
    pub fn new() -> Self {
        Self::with_exposition(Arc::new(CollectorRegistry::new()))
    }

    /// Registry that publishes into a shared collector registry.
    pub fn with_exposition(exposition: Arc<CollectorRegistry>) -> Self {
        Self {
            metrics: DashMap::new(),
            exposition,
        }
    }

    pub fn exposition(&self) -> &Arc<CollectorRegistry> {
        &self.exposition
    }

    /// Register a new metric and publish its collector.
    pub fn add_metric(&self, desc: MetricDescriptor) -> Result<Arc<Metric>> {
        validate_name(&desc.name)?;

        match self.metrics.entry(desc.name.clone()) {
            Entry::Occupied(e) => Err(Error::DuplicateName(e.key().clone())),
            Entry::Vacant(slot) => {
                desc.validate_shape()?;

                let metric = Arc::new(Metric::new(desc));
                self.exposition.register(Arc::clone(&metric))?;
                slot.insert(Arc::clone(&metric));

                tracing::debug!(
                    name = %metric.name(),
                    kind = %metric.kind(),
                    labels = metric.descriptor().labels.len(),
                    "metric registered"
                );
                Ok(metric)
            }
        }
    }

    /// Resolve a metric by the name it was registered under.
    pub fn get_metric(&self, name: &str) -> Result<Arc<Metric>> {
        self.metrics
            .get(name)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| Error::MetricNotFound(name.to_string()))
    }

    /// Prepend `prefix` to the display name of every stored metric.
    ///
    /// Only the exposition name changes: `get_metric` keeps using the
    /// original name. Metrics added later are not rewritten.
    pub fn set_prefix(&self, prefix: &str) {
        for e in self.metrics.iter() {
            e.value().rewrite_display_name(|n| format!("{prefix}{n}"));
        }
    }

    /// Append `suffix` to the display name of every stored metric.
    /// Same lookup rules as `set_prefix`.
    pub fn set_suffix(&self, suffix: &str) {
        for e in self.metrics.iter() {
            e.value().rewrite_display_name(|n| format!("{n}{suffix}"));
        }
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Lookup names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Render the exposition this registry publishes into.
    pub fn gather(&self) -> String {
        self.exposition.gather()
    }
}
