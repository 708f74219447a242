//! Axum HTTP server: router, listener, graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::mirror::correlation;
use crate::mirror::dispatch::Dispatcher;
use crate::mirror::events::{self, EventSink, MirrorEvent};
use crate::mirror::fanout::FanOut;
use crate::mirror::snapshot::RequestSnapshot;
use crate::mirror::translate;

/// Methods accepted on every path. Anything else gets 405 from the router.
const MIRRORED_METHODS: MethodFilter = MethodFilter::GET
    .or(MethodFilter::POST)
    .or(MethodFilter::PUT)
    .or(MethodFilter::DELETE)
    .or(MethodFilter::PATCH)
    .or(MethodFilter::HEAD)
    .or(MethodFilter::OPTIONS);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub fan_out: FanOut,
    pub sink: Arc<dyn EventSink>,
}

impl AppState {
    /// Wire the fan-out for `config.forward_urls` onto `client` and `sink`.
    pub fn new(config: ProxyConfig, client: reqwest::Client, sink: Arc<dyn EventSink>) -> Self {
        let dispatcher = Dispatcher::new(client, sink.clone());
        let fan_out = FanOut::new(dispatcher, config.forward_urls.clone());
        Self {
            config,
            fan_out,
            sink,
        }
    }
}

/// Every path, every mirrored method, one handler.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/", on(MIRRORED_METHODS, handle_mirror))
        .route("/{*path}", on(MIRRORED_METHODS, handle_mirror))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Build and run the HTTP server.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let listen_addr = state.config.listen_address();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "mirror-proxy listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("mirror-proxy shut down gracefully");
    Ok(())
}

/// Mirror one inbound request.
///
/// 1. Generate a request id
/// 2. Snapshot the request (full body read)
/// 3. Fan out to every destination and wait for all of them
/// 4. Answer with the primary's reply, or a synthesized error
async fn handle_mirror(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let request_id = correlation::generate_id();
    let span =
        mirror_tracing::mirror_request_span!(&request_id, request.method(), request.uri().path());
    let start = Instant::now();

    async move {
        let response = mirror(&state, request, request_id).await;

        let span = tracing::Span::current();
        span.record("status", response.status().as_u16());
        span.record("latency_ms", start.elapsed().as_millis() as u64);
        response
    }
    .instrument(span)
    .await
}

async fn mirror(state: &AppState, request: Request, request_id: String) -> Response {
    let snapshot = match RequestSnapshot::capture(request, request_id).await {
        Ok(snapshot) => Arc::new(snapshot),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return e.into_response();
        }
    };

    events::emit(
        state.sink.as_ref(),
        &MirrorEvent::RequestReceived {
            snapshot: &snapshot,
        },
    );
    tracing::Span::current().record("destinations", state.fan_out.destinations().len());

    match state.fan_out.forward(snapshot).await {
        Ok(primary) => translate::into_client_response(primary),
        Err(e) => e.into_response(),
    }
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
