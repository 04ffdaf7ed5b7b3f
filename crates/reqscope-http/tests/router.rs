//! End-to-end: requests through the instrumented demo router.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use tower::ServiceExt;

use reqscope_core::metric::defaults::{
    METRIC_REQUEST_BODY, METRIC_REQUEST_DURATION, METRIC_REQUEST_TOTAL, METRIC_REQUEST_UV_TOTAL,
    METRIC_RESPONSE_BODY, METRIC_URI_REQUEST_TOTAL,
};
use reqscope_core::metric::{Sample, TEXT_CONTENT_TYPE};
use reqscope_http::app_state::{AppState, METRIC_ORDERS_TOTAL};
use reqscope_http::{config, router, Monitor};

fn app_with(yaml: &str) -> (Router, Arc<Monitor>) {
    let cfg = config::load_from_str(yaml).unwrap();
    let state = AppState::new(cfg).unwrap();
    let monitor = state.monitor();
    (router::build_router(state), monitor)
}

fn app() -> (Router, Arc<Monitor>) {
    app_with("version: 1\n")
}

fn get_from(uri: &str, client: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

fn value(m: &Monitor, name: &str, labels: &[&str]) -> Option<f64> {
    m.get_metric(name).unwrap().value(labels)
}

#[tokio::test]
async fn route_template_status_and_sizes_are_recorded() {
    let (app, m) = app();

    let res = app.oneshot(get_from("/users/42", "10.1.1.1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"user 42");

    assert_eq!(value(&m, METRIC_REQUEST_TOTAL, &[]), Some(1.0));
    assert_eq!(value(&m, METRIC_REQUEST_UV_TOTAL, &[]), Some(1.0));
    assert_eq!(
        value(&m, METRIC_URI_REQUEST_TOTAL, &["/users/:id", "GET", "200"]),
        Some(1.0)
    );
    assert_eq!(value(&m, METRIC_RESPONSE_BODY, &[]), Some(7.0));
    // An empty body has a known length of zero.
    assert_eq!(value(&m, METRIC_REQUEST_BODY, &[]), Some(0.0));

    let Some(Sample::Histogram(h)) = m
        .get_metric(METRIC_REQUEST_DURATION)
        .unwrap()
        .sample(&["/users/:id"])
    else {
        panic!("duration not observed");
    };
    assert_eq!(h.count, 1);
}

#[tokio::test]
async fn declared_content_length_is_counted() {
    let (app, m) = app();

    let req = Request::builder()
        .method("POST")
        .uri("/echo")
        .header(header::CONTENT_LENGTH, "5")
        .body(Body::from("hello"))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(value(&m, METRIC_REQUEST_BODY, &[]), Some(5.0));
    assert_eq!(value(&m, METRIC_RESPONSE_BODY, &[]), Some(5.0));
}

#[tokio::test]
async fn streamed_body_of_unknown_length_is_not_counted() {
    let (app, m) = app();

    let chunks = futures_util::stream::iter(vec![
        Ok::<_, std::io::Error>("ab"),
        Ok("cd"),
    ]);
    let req = Request::builder()
        .method("POST")
        .uri("/echo")
        .body(Body::from_stream(chunks))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(value(&m, METRIC_REQUEST_BODY, &[]), None);
    assert_eq!(
        value(&m, METRIC_URI_REQUEST_TOTAL, &["/echo", "POST", "200"]),
        Some(1.0)
    );
}

#[tokio::test]
async fn unmatched_route_records_empty_route() {
    let (app, m) = app();

    let res = app.oneshot(get_from("/nope", "10.1.1.1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    assert_eq!(value(&m, METRIC_URI_REQUEST_TOTAL, &["", "GET", "404"]), Some(1.0));
    assert_eq!(value(&m, METRIC_RESPONSE_BODY, &[]), None);
}

#[tokio::test]
async fn metric_path_is_served_and_not_measured() {
    let (app, m) = app();

    app.clone()
        .oneshot(get_from("/", "10.1.1.1"))
        .await
        .unwrap();

    let res = app
        .oneshot(get_from("/debug/metrics", "10.1.1.2"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        TEXT_CONTENT_TYPE
    );

    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("# TYPE http_request_total counter\n"));
    assert!(text.contains("http_request_total 1\n"));
    assert!(text.contains("http_uri_request_total{route=\"/\",method=\"GET\",status=\"200\"} 1\n"));

    // Scrapes are neither requests nor visitors.
    assert_eq!(value(&m, METRIC_REQUEST_TOTAL, &[]), Some(1.0));
    assert_eq!(value(&m, METRIC_REQUEST_UV_TOTAL, &[]), Some(1.0));
    assert!(!m.visitors().contains("10.1.1.2"));
}

#[tokio::test]
async fn visitors_are_keyed_by_forwarded_client() {
    let (app, m) = app();

    for client in ["1.1.1.1", "2.2.2.2, 10.0.0.1", "1.1.1.1", "2.2.2.2"] {
        let res = app.clone().oneshot(get_from("/", client)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    assert_eq!(value(&m, METRIC_REQUEST_TOTAL, &[]), Some(4.0));
    assert_eq!(value(&m, METRIC_REQUEST_UV_TOTAL, &[]), Some(2.0));
}

#[tokio::test]
async fn application_metrics_share_the_exposition() {
    let (app, m) = app();

    let req = Request::builder()
        .method("POST")
        .uri("/orders")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    assert_eq!(value(&m, METRIC_ORDERS_TOTAL, &["web"]), Some(1.0));
    assert_eq!(
        value(&m, METRIC_URI_REQUEST_TOTAL, &["/orders", "POST", "201"]),
        Some(1.0)
    );

    let res = app
        .oneshot(get_from("/debug/metrics", "10.1.1.1"))
        .await
        .unwrap();
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("demo_orders_total{channel=\"web\"} 1\n"));
}

#[tokio::test]
async fn configured_path_and_prefix_apply() {
    let (app, m) = app_with(
        r#"
version: 1
metrics:
  path: "/metrics"
  prefix: "shop_"
"#,
    );

    app.clone()
        .oneshot(get_from("/healthz", "10.1.1.1"))
        .await
        .unwrap();

    let res = app.clone().oneshot(get_from("/metrics", "10.1.1.1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("shop_http_request_total 1\n"));
    assert!(!text.contains("\nhttp_request_total"));

    // Lookup keeps the registered name.
    assert_eq!(value(&m, METRIC_REQUEST_TOTAL, &[]), Some(1.0));

    let res = app.oneshot(get_from("/debug/metrics", "10.1.1.1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recording_failures_do_not_change_the_response() {
    // No default metrics registered: every record task fails.
    let monitor = Arc::new(Monitor::default());
    let app = monitor.instrument(Router::new().route("/", get(|| async { "fine" })));

    let res = app.oneshot(get_from("/", "10.1.1.1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"fine");
}

#[tokio::test]
async fn exposition_can_live_on_a_separate_router() {
    let mut monitor = Monitor::default();
    monitor.set_metric_path("stats");
    monitor.register_default_metrics().unwrap();
    let monitor = Arc::new(monitor);

    let api = monitor.instrument_without_exposing(Router::new().route("/", get(|| async { "api" })));
    let admin = monitor.expose(Router::new());

    api.clone().oneshot(get_from("/", "10.1.1.1")).await.unwrap();
    let res = api.oneshot(get_from("/stats", "10.1.1.1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = admin.oneshot(get_from("/stats", "10.1.1.1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("http_request_total 1\n"));
}

#[tokio::test]
async fn streamed_response_bytes_are_counted_when_the_stream_ends() {
    let mut monitor = Monitor::default();
    monitor.set_metric_path("/metrics");
    monitor.register_default_metrics().unwrap();
    let monitor = Arc::new(monitor);

    let app = monitor.instrument(Router::new().route(
        "/download",
        get(|| async {
            let chunks = futures_util::stream::iter(vec![
                Ok::<_, std::io::Error>("hello"),
                Ok(" world"),
            ]);
            Body::from_stream(chunks)
        }),
    ));

    let res = app.oneshot(get_from("/download", "10.1.1.1")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    // Nothing has been sent yet.
    assert_eq!(value(&monitor, METRIC_RESPONSE_BODY, &[]), None);

    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"hello world");
    assert_eq!(value(&monitor, METRIC_RESPONSE_BODY, &[]), Some(11.0));
    assert_eq!(
        value(&monitor, METRIC_URI_REQUEST_TOTAL, &["/download", "GET", "200"]),
        Some(1.0)
    );
}
