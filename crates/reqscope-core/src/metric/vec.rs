//! Labeled collectors: one time series per distinct label-value tuple.
//!
//! Series live in a `DashMap` keyed by the positional label values, so
//! concurrent recordings on different series never contend and recordings
//! on the same series only touch atomics. Summaries keep a sample window and
//! are updated under the shard's write guard. Values are `f64` stored as bits
//! in an `AtomicU64`.

use std::collections::VecDeque;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::metric::Objective;

/// Observations kept per summary series for quantile estimation.
pub const SUMMARY_WINDOW: usize = 500;

type SeriesKey = Vec<String>;

fn key_of(values: &[&str]) -> SeriesKey {
    values.iter().map(|v| v.to_string()).collect()
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_str(names: &[String], values: &[String], extra: Option<(&str, &str)>) -> String {
    let mut parts: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect();
    if let Some((k, v)) = extra {
        parts.push(format!("{}=\"{}\"", k, v));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}

fn fmt_float(v: f64) -> String {
    if v == f64::INFINITY {
        "+Inf".into()
    } else if v == f64::NEG_INFINITY {
        "-Inf".into()
    } else {
        v.to_string()
    }
}

#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    fn add(&self, v: f64) {
        let mut cur = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(cur) + v).to_bits();
            match self
                .0
                .compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }
}

fn sorted_rows<V, T>(map: &DashMap<SeriesKey, V>, read: impl Fn(&V) -> T) -> Vec<(SeriesKey, T)> {
    let mut rows: Vec<(SeriesKey, T)> = map
        .iter()
        .map(|r| (r.key().clone(), read(r.value())))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

#[derive(Debug, Default)]
pub struct CounterVec {
    map: DashMap<SeriesKey, AtomicF64>,
}

impl CounterVec {
    /// Increment by an arbitrary non-negative value (checked by the caller).
    pub fn add(&self, labels: &[&str], v: f64) {
        let counter = self.map.entry(key_of(labels)).or_default();
        counter.add(v);
    }

    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        self.map.get(&key_of(labels)).map(|c| c.get())
    }

    /// Render in Prometheus text exposition format.
    pub(crate) fn render(&self, name: &str, label_names: &[String], out: &mut String) {
        for (key, val) in sorted_rows(&self.map, AtomicF64::get) {
            let _ = writeln!(out, "{}{} {}", name, label_str(label_names, &key, None), fmt_float(val));
        }
    }
}

#[derive(Debug, Default)]
pub struct GaugeVec {
    map: DashMap<SeriesKey, AtomicF64>,
}

impl GaugeVec {
    /// Add an arbitrary signed delta.
    pub fn add(&self, labels: &[&str], v: f64) {
        let gauge = self.map.entry(key_of(labels)).or_default();
        gauge.add(v);
    }

    pub fn set(&self, labels: &[&str], v: f64) {
        let gauge = self.map.entry(key_of(labels)).or_default();
        gauge.set(v);
    }

    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        self.map.get(&key_of(labels)).map(|g| g.get())
    }

    pub(crate) fn render(&self, name: &str, label_names: &[String], out: &mut String) {
        for (key, val) in sorted_rows(&self.map, AtomicF64::get) {
            let _ = writeln!(out, "{}{} {}", name, label_str(label_names, &key, None), fmt_float(val));
        }
    }
}

/// Point-in-time view of one histogram series. Bucket counts are cumulative.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub buckets: Vec<(f64, u64)>,
    pub count: u64,
    pub sum: f64,
}

#[derive(Debug)]
struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicF64,
    buckets: Vec<AtomicU64>,
}

impl AtomicHistogram {
    fn new(len: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicF64::default(),
            buckets: (0..len).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

#[derive(Debug)]
pub struct HistogramVec {
    bounds: Vec<f64>,
    map: DashMap<SeriesKey, AtomicHistogram>,
}

impl HistogramVec {
    /// `bounds` must be non-empty and strictly ascending (checked by the
    /// descriptor before construction).
    pub fn new(bounds: Vec<f64>) -> Self {
        Self {
            bounds,
            map: DashMap::new(),
        }
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Observe a value and increment cumulative buckets.
    pub fn observe(&self, labels: &[&str], v: f64) {
        let len = self.bounds.len();
        let hist = self
            .map
            .entry(key_of(labels))
            .or_insert_with(|| AtomicHistogram::new(len));

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.add(v);

        // Cumulative buckets: every bucket whose bound is >= v.
        for (i, &b) in self.bounds.iter().enumerate() {
            if v <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn get(&self, labels: &[&str]) -> Option<HistogramSnapshot> {
        self.map.get(&key_of(labels)).map(|h| self.snapshot(&h))
    }

    fn snapshot(&self, hist: &AtomicHistogram) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: self
                .bounds
                .iter()
                .zip(&hist.buckets)
                .map(|(&le, c)| (le, c.load(Ordering::Relaxed)))
                .collect(),
            count: hist.count.load(Ordering::Relaxed),
            sum: hist.sum.get(),
        }
    }

    pub(crate) fn render(&self, name: &str, label_names: &[String], out: &mut String) {
        for (key, snap) in sorted_rows(&self.map, |h| self.snapshot(h)) {
            for (le, count) in &snap.buckets {
                let le = fmt_float(*le);
                let labels = label_str(label_names, &key, Some(("le", &le)));
                let _ = writeln!(out, "{}_bucket{} {}", name, labels, count);
            }
            let labels = label_str(label_names, &key, Some(("le", "+Inf")));
            let _ = writeln!(out, "{}_bucket{} {}", name, labels, snap.count);

            let labels = label_str(label_names, &key, None);
            let _ = writeln!(out, "{}_sum{} {}", name, labels, fmt_float(snap.sum));
            let _ = writeln!(out, "{}_count{} {}", name, labels, snap.count);
        }
    }
}

/// Point-in-time view of one summary series.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySnapshot {
    /// `(quantile, value)` per objective; value is NaN before any observation.
    pub quantiles: Vec<(f64, f64)>,
    pub count: u64,
    pub sum: f64,
}

#[derive(Debug, Default)]
struct SummarySeries {
    window: VecDeque<f64>,
    count: u64,
    sum: f64,
}

impl SummarySeries {
    fn snapshot(&self, objectives: &[Objective]) -> SummarySnapshot {
        let mut sorted: Vec<f64> = self.window.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let quantiles = objectives
            .iter()
            .map(|o| (o.quantile, quantile_of(&sorted, o.quantile)))
            .collect();

        SummarySnapshot {
            quantiles,
            count: self.count,
            sum: self.sum,
        }
    }
}

/// Nearest-rank quantile over a sorted slice.
fn quantile_of(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let n = sorted.len();
    let rank = ((q * n as f64).ceil() as usize).clamp(1, n);
    sorted[rank - 1]
}

/// Summary over the most recent `SUMMARY_WINDOW` observations of each series.
///
/// Quantiles are computed exactly over the window at render time, so every
/// objective's allowed rank error is met within the window.
#[derive(Debug)]
pub struct SummaryVec {
    objectives: Vec<Objective>,
    map: DashMap<SeriesKey, SummarySeries>,
}

impl SummaryVec {
    pub fn new(objectives: Vec<Objective>) -> Self {
        Self {
            objectives,
            map: DashMap::new(),
        }
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn observe(&self, labels: &[&str], v: f64) {
        let mut s = self.map.entry(key_of(labels)).or_default();
        if s.window.len() == SUMMARY_WINDOW {
            s.window.pop_front();
        }
        s.window.push_back(v);
        s.count += 1;
        s.sum += v;
    }

    pub fn get(&self, labels: &[&str]) -> Option<SummarySnapshot> {
        self.map
            .get(&key_of(labels))
            .map(|s| s.snapshot(&self.objectives))
    }

    pub(crate) fn render(&self, name: &str, label_names: &[String], out: &mut String) {
        for (key, snap) in sorted_rows(&self.map, |s| s.snapshot(&self.objectives)) {
            for (q, v) in &snap.quantiles {
                let q = fmt_float(*q);
                let labels = label_str(label_names, &key, Some(("quantile", &q)));
                let _ = writeln!(out, "{}{} {}", name, labels, fmt_float(*v));
            }
            let labels = label_str(label_names, &key, None);
            let _ = writeln!(out, "{}_sum{} {}", name, labels, fmt_float(snap.sum));
            let _ = writeln!(out, "{}_count{} {}", name, labels, snap.count);
        }
    }
}
