//! Shared application state for the demo server.
//!
//! Builds the monitor from config at startup and registers the
//! application's own metrics next to the defaults. Startup errors are
//! returned, not panicked on.

use std::sync::Arc;

use reqscope_core::error::Result;
use reqscope_core::metric::MetricDescriptor;

use crate::config::AppConfig;
use crate::monitor::Monitor;

/// Application-level counter incremented by the demo `/orders` handler.
pub const METRIC_ORDERS_TOTAL: &str = "demo_orders_total";

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    monitor: Arc<Monitor>,
}

struct AppStateInner {
    cfg: AppConfig,
}

impl AppState {
    pub fn new(cfg: AppConfig) -> Result<Self> {
        let monitor = Monitor::from_config(&cfg.metrics)?;

        monitor.add_metric(
            MetricDescriptor::counter(METRIC_ORDERS_TOTAL, "orders accepted by the demo app.")
                .with_labels(["channel"]),
        )?;

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg }),
            monitor: Arc::new(monitor),
        })
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.inner.cfg
    }

    pub fn monitor(&self) -> Arc<Monitor> {
        Arc::clone(&self.monitor)
    }
}
