//! Per-request instrumentation.
//!
//! `Start -> Pass-through -> Measure -> Record -> Done`: the middleware
//! captures a start instant, lets the inner service produce the response,
//! derives `RequestFacts` from request and response, and fans the metric
//! updates out over a `ParallelRecorder`. Recording failures are logged and
//! never touch the response.
//!
//! A response body without an exact size (streamed, chunked) is wrapped in
//! a counting stream instead; its bytes are added to the response-body
//! counter once the stream ends or is dropped.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::{
    body::{Body, BodyDataStream, Bytes, HttpBody},
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use futures_util::Stream;

use reqscope_core::error::Result;
use reqscope_core::metric::defaults::{
    METRIC_REQUEST_BODY, METRIC_REQUEST_DURATION, METRIC_REQUEST_TOTAL, METRIC_REQUEST_UV_TOTAL,
    METRIC_RESPONSE_BODY, METRIC_SLOW_REQUEST, METRIC_URI_REQUEST_TOTAL,
};

use crate::monitor::Monitor;
use crate::recorder::ParallelRecorder;

/// Everything the record phase needs to know about one request.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    /// Matched route template, empty when no route matched.
    pub route: String,
    pub method: String,
    pub status: u16,
    pub latency: Duration,
    /// Request body length; negative when unknown.
    pub content_length: i64,
    /// Response body length; 0 when empty or not known up front.
    pub response_size: u64,
    pub client: String,
}

impl RequestFacts {
    fn route_labels(&self) -> [String; 3] {
        [
            self.route.clone(),
            self.method.clone(),
            self.status.to_string(),
        ]
    }
}

pub async fn monitor_interceptor(
    State(monitor): State<Arc<Monitor>>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path() == monitor.metric_path() {
        return next.run(request).await;
    }
    let start = Instant::now();

    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    let method = request.method().to_string();
    let client = client_key(&request);
    let content_length = request_content_length(&request);

    let response = next.run(request).await;
    let exact_size = response.body().size_hint().exact();

    let facts = RequestFacts {
        route,
        method,
        status: response.status().as_u16(),
        latency: start.elapsed(),
        content_length,
        response_size: exact_size.unwrap_or(0),
        client,
    };

    if let Err(err) = monitor.record(facts).await {
        tracing::warn!(code = err.code().as_str(), error = %err, "handler metric error");
    }

    match exact_size {
        Some(_) => response,
        None => count_streamed_body(monitor, response),
    }
}

fn count_streamed_body(monitor: Arc<Monitor>, response: Response) -> Response {
    let (parts, body) = response.into_parts();
    let counted = CountingStream {
        inner: body.into_data_stream(),
        sent: 0,
        monitor: Some(monitor),
    };
    Response::from_parts(parts, Body::from_stream(counted))
}

/// Data stream of a response body that records the bytes it yielded.
struct CountingStream {
    inner: BodyDataStream,
    sent: u64,
    /// Taken once the count has been recorded.
    monitor: Option<Arc<Monitor>>,
}

impl CountingStream {
    fn finish(&mut self) {
        let Some(monitor) = self.monitor.take() else {
            return;
        };
        if self.sent == 0 {
            return;
        }
        let recorded = monitor
            .get_metric(METRIC_RESPONSE_BODY)
            .and_then(|m| m.add(&[], self.sent as f64));
        if let Err(err) = recorded {
            tracing::warn!(code = err.code().as_str(), error = %err, "handler metric error");
        }
    }
}

impl Stream for CountingStream {
    type Item = std::result::Result<Bytes, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        match &polled {
            Poll::Ready(Some(Ok(chunk))) => self.sent += chunk.len() as u64,
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => self.finish(),
            Poll::Pending => {}
        }
        polled
    }
}

impl Drop for CountingStream {
    // The client may hang up mid-stream; count what was handed out.
    fn drop(&mut self) {
        self.finish();
    }
}

impl Monitor {
    /// Apply one request's facts to the metrics, concurrently.
    ///
    /// Returns the first recording error, after every update has run.
    pub async fn record(self: &Arc<Self>, facts: RequestFacts) -> Result<()> {
        let facts = Arc::new(facts);
        let mut p = ParallelRecorder::new();

        // request total
        let m = Arc::clone(self);
        p.add(move || m.get_metric(METRIC_REQUEST_TOTAL)?.inc(&[]));

        // unique visitors
        let (m, f) = (Arc::clone(self), Arc::clone(&facts));
        p.add(move || {
            if m.visitors().check_and_add(&f.client) {
                return Ok(());
            }
            m.get_metric(METRIC_REQUEST_UV_TOTAL)?.inc(&[])
        });

        // per-route total
        let (m, f) = (Arc::clone(self), Arc::clone(&facts));
        p.add(move || {
            let [route, method, status] = f.route_labels();
            m.get_metric(METRIC_URI_REQUEST_TOTAL)?
                .inc(&[route.as_str(), method.as_str(), status.as_str()])
        });

        // request body size; negative means unknown
        if facts.content_length >= 0 {
            let (m, f) = (Arc::clone(self), Arc::clone(&facts));
            p.add(move || {
                m.get_metric(METRIC_REQUEST_BODY)?
                    .add(&[], f.content_length as f64)
            });
        }

        // slow requests, compared in whole seconds
        if facts.latency.as_secs() > self.slow_time_secs() {
            let (m, f) = (Arc::clone(self), Arc::clone(&facts));
            p.add(move || {
                let [route, method, status] = f.route_labels();
                m.get_metric(METRIC_SLOW_REQUEST)?
                    .inc(&[route.as_str(), method.as_str(), status.as_str()])
            });
        }

        // duration
        let (m, f) = (Arc::clone(self), Arc::clone(&facts));
        p.add(move || {
            m.get_metric(METRIC_REQUEST_DURATION)?
                .observe(&[f.route.as_str()], f.latency.as_secs_f64())
        });

        // response body size
        if facts.response_size > 0 {
            let (m, f) = (Arc::clone(self), Arc::clone(&facts));
            p.add(move || {
                m.get_metric(METRIC_RESPONSE_BODY)?
                    .add(&[], f.response_size as f64)
            });
        }

        p.wait().await
    }
}

/// Client identifier for visitor counting: first `X-Forwarded-For` hop,
/// then `X-Real-IP`, then the peer address, else empty.
pub fn client_key(request: &Request) -> String {
    let headers = request.headers();
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
        })
        .unwrap_or_default()
}

/// `Content-Length` if present, else the body's exact size, else -1.
pub fn request_content_length(request: &Request) -> i64 {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok());

    declared
        .or_else(|| {
            request
                .body()
                .size_hint()
                .exact()
                .and_then(|n| i64::try_from(n).ok())
        })
        .unwrap_or(-1)
}
