//! HTTP server for the probe and self-metrics endpoints.

use crate::config::ExporterConfig;
use crate::metrics::{render, ExporterMetrics, MetricsError, ProbeOutcome};
use crate::probe::{ProbeError, ProbeParameters, ProbeQuery, Prober, ToolRunner};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tower_http::trace::TraceLayer;

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("failed to create metrics: {0}")]
    Metrics(#[from] MetricsError),

    #[error("server error: {0}")]
    Server(String),
}

/// State shared by all request handlers. Read-only apart from the
/// exporter's own counters.
pub struct AppState<R> {
    prober: Prober<R>,
    exporter: ExporterMetrics,
}

impl<R: ToolRunner> AppState<R> {
    pub fn new(runner: R, config: &ExporterConfig) -> Result<Self, MetricsError> {
        Ok(Self {
            prober: Prober::new(runner, config),
            exporter: ExporterMetrics::new()?,
        })
    }
}

/// Builds the router serving `/probe`, `/metrics` and `/health`.
pub fn create_router<R: ToolRunner>(state: Arc<AppState<R>>) -> Router {
    Router::new()
        .route("/probe", get(probe_handler::<R>))
        .route("/metrics", get(metrics_handler::<R>))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server for exposing restic probe metrics.
pub struct MetricsServer<R> {
    bind_addr: SocketAddr,
    state: Arc<AppState<R>>,
}

impl<R: ToolRunner> MetricsServer<R> {
    /// Creates a new server for `config`, probing through `runner`.
    pub fn new(config: &ExporterConfig, runner: R) -> Result<Self, ServerError> {
        Ok(Self {
            bind_addr: config.bind_addr()?,
            state: Arc::new(AppState::new(runner, config)?),
        })
    }

    /// Returns the router without binding a socket.
    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.state))
    }

    /// Starts the HTTP server.
    ///
    /// This method runs the server until Ctrl-C is received.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!(
            addr = %self.bind_addr,
            "Exporter listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
                tracing::info!("Shutting down");
            })
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        Ok(())
    }
}

/// Handler for the /probe endpoint.
///
/// Status is always decided before any body is produced: 200 with metrics,
/// 400 for a missing filter, 504 on timeout, 500 on any other failure.
/// If the client goes away the handler future is dropped, which kills the
/// running restic process.
async fn probe_handler<R: ToolRunner>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<ProbeQuery>,
) -> Response {
    let params = match ProbeParameters::from_query(query) {
        Ok(params) => params,
        Err(e) => {
            state.exporter.observe(ProbeOutcome::Invalid, None);
            return (StatusCode::BAD_REQUEST, format!("{e}\n")).into_response();
        }
    };

    let started = Instant::now();
    let result = state.prober.probe(&params).await;
    let elapsed = Some(started.elapsed());

    let rendered = result
        .map_err(ProbeFailure::Probe)
        .and_then(|r| render(&r).map_err(ProbeFailure::Render));
    let body = match rendered {
        Ok(body) => body,
        Err(failure) => {
            let (outcome, response) = failure.into_parts();
            state.exporter.observe(outcome, elapsed);
            return response;
        }
    };

    state.exporter.observe(ProbeOutcome::Success, elapsed);
    (
        StatusCode::OK,
        [("content-type", METRICS_CONTENT_TYPE)],
        body,
    )
        .into_response()
}

enum ProbeFailure {
    Probe(ProbeError),
    Render(MetricsError),
}

impl ProbeFailure {
    // Details stay in the log; scrapers only see a fixed message.
    fn into_parts(self) -> (ProbeOutcome, Response) {
        match self {
            Self::Probe(ProbeError::Cancelled(_)) => (
                ProbeOutcome::Cancelled,
                (StatusCode::GATEWAY_TIMEOUT, "probe timed out\n").into_response(),
            ),
            Self::Probe(e) if e.is_client_error() => (
                ProbeOutcome::Invalid,
                (StatusCode::BAD_REQUEST, format!("{e}\n")).into_response(),
            ),
            Self::Probe(_) => (
                ProbeOutcome::Failed,
                (StatusCode::INTERNAL_SERVER_ERROR, "probe failed\n").into_response(),
            ),
            Self::Render(e) => {
                tracing::error!(error = %e, "Failed to render probe metrics");
                (
                    ProbeOutcome::Failed,
                    (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics\n")
                        .into_response(),
                )
            }
        }
    }
}

/// Handler for the /metrics endpoint.
async fn metrics_handler<R: ToolRunner>(State(state): State<Arc<AppState<R>>>) -> Response {
    match state.exporter.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", METRICS_CONTENT_TYPE)],
            output,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
