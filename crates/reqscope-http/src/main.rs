//! reqscope demo server
//!
//! Serves a few routes behind the request-metrics middleware and exposes
//! the collected metrics for scraping.
//!
//! Usage: `reqscope-http [config.yaml]` (defaults to `reqscope.yaml`).

use std::net::SocketAddr;

use tracing_subscriber::{fmt, EnvFilter};

use reqscope_core::error::Error;
use reqscope_http::{app_state, config, router};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "reqscope.yaml".into());
    let cfg = config::load_from_file(&path)?;

    let state = app_state::AppState::new(cfg)?;
    let listen: SocketAddr = state
        .cfg()
        .server
        .listen
        .parse()
        .map_err(|e| Error::Config(format!("server.listen must be a valid SocketAddr: {e}")))?;
    tracing::info!(
        metric_path = %state.monitor().metric_path(),
        slow_time_secs = state.monitor().slow_time_secs(),
        metrics = state.monitor().registry().len(),
        "monitor ready"
    );
    let app = router::build_router(state);

    tracing::info!(%listen, "reqscope-http starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
