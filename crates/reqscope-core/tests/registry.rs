//! Registration rules of `MetricRegistry`.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use reqscope_core::metric::defaults::{
    DEFAULT_DURATION_BUCKETS, METRIC_REQUEST_DURATION, METRIC_REQUEST_TOTAL,
    METRIC_SLOW_REQUEST, METRIC_URI_REQUEST_TOTAL,
};
use reqscope_core::metric::{CollectorRegistry, Objective};
use reqscope_core::{MetricDescriptor, MetricKind, MetricRegistry};

fn code(err: reqscope_core::Error) -> &'static str {
    err.code().as_str()
}

#[test]
fn duplicate_name_keeps_first_instance() {
    let reg = MetricRegistry::new();
    let first = reg
        .add_metric(MetricDescriptor::counter("jobs_total", "first"))
        .unwrap();
    first.inc(&[]).unwrap();

    let err = reg
        .add_metric(MetricDescriptor::gauge("jobs_total", "second"))
        .unwrap_err();
    assert_eq!(code(err), "DUPLICATE_NAME");

    let kept = reg.get_metric("jobs_total").unwrap();
    assert!(Arc::ptr_eq(&first, &kept));
    assert_eq!(kept.kind(), MetricKind::Counter);
    assert_eq!(kept.descriptor().help, "first");
    assert_eq!(kept.value(&[]), Some(1.0));
    assert_eq!(reg.len(), 1);
}

#[test]
fn invalid_names_are_rejected() {
    let reg = MetricRegistry::new();
    for bad in ["", "1st_metric", "has space", "dash-ed"] {
        let err = reg.add_metric(MetricDescriptor::counter(bad, "x")).unwrap_err();
        assert_eq!(code(err), "INVALID_NAME", "name={bad:?}");
    }
    assert!(reg.is_empty());
}

#[test]
fn unknown_kind_string_is_invalid_type() {
    let err = "meter".parse::<MetricKind>().unwrap_err();
    assert_eq!(code(err), "INVALID_TYPE");
    assert_eq!("Histogram".parse::<MetricKind>().unwrap(), MetricKind::Histogram);
}

#[test]
fn histogram_and_summary_need_their_parameters() {
    let reg = MetricRegistry::new();

    let err = reg
        .add_metric(MetricDescriptor::histogram("latency", "x", vec![]))
        .unwrap_err();
    assert_eq!(code(err), "MISSING_BUCKETS");

    let err = reg
        .add_metric(MetricDescriptor::summary("sizes", "x", vec![]))
        .unwrap_err();
    assert_eq!(code(err), "MISSING_OBJECTIVES");

    let err = reg
        .add_metric(MetricDescriptor::histogram("latency", "x", vec![1.0, 0.5]))
        .unwrap_err();
    assert_eq!(code(err), "INVALID_BUCKETS");

    let err = reg
        .add_metric(MetricDescriptor::summary(
            "sizes",
            "x",
            vec![Objective::new(1.5, 0.01)],
        ))
        .unwrap_err();
    assert_eq!(code(err), "INVALID_OBJECTIVE");

    // Failed registrations leave nothing behind.
    assert!(reg.is_empty());
    assert!(reg.exposition().is_empty());
}

#[test]
fn bad_label_names_are_rejected() {
    let reg = MetricRegistry::new();
    let err = reg
        .add_metric(MetricDescriptor::counter("a_total", "x").with_labels(["route", "route"]))
        .unwrap_err();
    assert_eq!(code(err), "INVALID_LABEL");

    let err = reg
        .add_metric(MetricDescriptor::histogram("b", "x", vec![1.0]).with_labels(["le"]))
        .unwrap_err();
    assert_eq!(code(err), "INVALID_LABEL");
}

#[test]
fn get_metric_unknown_name() {
    let reg = MetricRegistry::new();
    let err = reg.get_metric("nope").unwrap_err();
    assert_eq!(code(err), "METRIC_NOT_FOUND");
}

#[test]
fn shared_exposition_rejects_conflicting_collectors() {
    let expo = Arc::new(CollectorRegistry::new());
    let a = MetricRegistry::with_exposition(Arc::clone(&expo));
    let b = MetricRegistry::with_exposition(Arc::clone(&expo));

    a.add_metric(MetricDescriptor::counter("shared_total", "x")).unwrap();
    let err = b
        .add_metric(MetricDescriptor::counter("shared_total", "x"))
        .unwrap_err();
    assert_eq!(code(err), "COLLECTOR_CONFLICT");
    assert!(b.get_metric("shared_total").is_err());
    assert_eq!(expo.len(), 1);
}

#[test]
fn separate_registries_do_not_collide() {
    let a = MetricRegistry::new();
    let b = MetricRegistry::new();
    a.register_default_metrics(&DEFAULT_DURATION_BUCKETS, 5).unwrap();
    b.register_default_metrics(&DEFAULT_DURATION_BUCKETS, 5).unwrap();
    assert_eq!(a.len(), 7);
    assert_eq!(b.len(), 7);
}

#[test]
fn default_metrics_register_once() {
    let reg = MetricRegistry::new();
    reg.register_default_metrics(&[0.5, 1.0], 3).unwrap();
    assert_eq!(reg.len(), 7);

    let route = reg.get_metric(METRIC_URI_REQUEST_TOTAL).unwrap();
    assert_eq!(route.descriptor().labels, ["route", "method", "status"]);
    let duration = reg.get_metric(METRIC_REQUEST_DURATION).unwrap();
    assert_eq!(duration.kind(), MetricKind::Histogram);
    assert_eq!(duration.descriptor().buckets, [0.5, 1.0]);
    let slow = reg.get_metric(METRIC_SLOW_REQUEST).unwrap();
    assert!(slow.descriptor().help.contains("t=3"));

    let err = reg.register_default_metrics(&[0.5, 1.0], 3).unwrap_err();
    assert_eq!(code(err), "DUPLICATE_NAME");
    assert_eq!(reg.len(), 7);
}

#[test]
fn prefix_and_suffix_rewrite_display_names_only() {
    let reg = MetricRegistry::new();
    reg.register_default_metrics(&DEFAULT_DURATION_BUCKETS, 5).unwrap();
    reg.set_prefix("shop_");
    reg.set_suffix("_v2");

    let m = reg.get_metric(METRIC_REQUEST_TOTAL).unwrap();
    assert_eq!(m.name(), "http_request_total");
    assert_eq!(m.display_name(), "shop_http_request_total_v2");
    assert!(reg.get_metric("shop_http_request_total_v2").is_err());

    m.inc(&[]).unwrap();
    let text = reg.gather();
    assert!(text.contains("# TYPE shop_http_request_total_v2 counter"));
    assert!(text.contains("\nshop_http_request_total_v2 1\n"));
    assert!(!text.contains("\nhttp_request_total "));
}
