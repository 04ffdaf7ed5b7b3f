//! Operational HTTP endpoints.
//!
//! - `/healthz`       : liveness
//! - metric path      : Prometheus text format (default `/debug/metrics`)

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use reqscope_core::metric::TEXT_CONTENT_TYPE;

use crate::monitor::Monitor;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics(State(monitor): State<Arc<Monitor>>) -> Response {
    let body = monitor.gather();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
        body,
    )
        .into_response()
}
