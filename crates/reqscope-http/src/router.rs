//! Axum router wiring for the demo server.
//!
//! A handful of application routes, `/healthz`, and the monitor's
//! exposition route, all behind the measuring middleware.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::app_state::{AppState, METRIC_ORDERS_TOTAL};
use crate::ops;

pub fn build_router(state: AppState) -> Router {
    let monitor = state.monitor();
    let app = Router::new()
        .route("/", get(index))
        .route("/users/:id", get(user))
        .route("/echo", post(echo))
        .route("/orders", post(create_order))
        .route("/healthz", get(ops::healthz))
        .with_state(state);

    monitor.instrument(app)
}

async fn index() -> &'static str {
    "reqscope demo"
}

async fn user(Path(id): Path<String>) -> String {
    format!("user {id}")
}

async fn echo(body: String) -> String {
    body
}

async fn create_order(State(state): State<AppState>) -> impl IntoResponse {
    let recorded = state
        .monitor()
        .get_metric(METRIC_ORDERS_TOTAL)
        .and_then(|m| m.inc(&["web"]));
    if let Err(err) = recorded {
        tracing::warn!(error = %err, "order metric not recorded");
    }
    (StatusCode::CREATED, "accepted")
}
