//! Subscriber assembly and TracingGuard.

use std::path::Path;

use anyhow::{anyhow, Result};
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::TracingConfig;
use crate::otlp;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// RAII guard that flushes the log file writer and shuts down the tracer
/// provider on drop.
pub struct TracingGuard {
    provider: Option<SdkTracerProvider>,
    _file_guard: Option<WorkerGuard>,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if let Some(ref mut provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shutdown tracer provider: {e}");
            }
        }
    }
}

/// Initialize the tracing subsystem.
///
/// Always logs to stderr. Adds a JSON-lines file layer when `log_file` is set
/// and an OTLP layer when `otlp_endpoint` is set. If either optional output
/// fails to initialize, the proxy still starts with the remaining layers and
/// a warning is logged.
///
/// Returns a [`TracingGuard`] that must be held for the lifetime of the
/// application so buffered log lines and spans are flushed on shutdown.
pub fn init_tracing(config: &TracingConfig) -> TracingGuard {
    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<BoxedLayer> = vec![tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .boxed()];

    let mut file_error = None;
    let file_guard = match config.log_file.as_deref() {
        Some(path) => match file_writer(path) {
            Ok((writer, guard)) => {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(writer)
                        .boxed(),
                );
                Some(guard)
            }
            Err(e) => {
                file_error = Some(e);
                None
            }
        },
        None => None,
    };

    let mut otlp_error = None;
    let provider = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => match otlp::build_provider(config, endpoint) {
            Ok(provider) => {
                let tracer = provider.tracer(config.service_name.clone());
                layers.push(tracing_opentelemetry::layer().with_tracer(tracer).boxed());
                Some(provider)
            }
            Err(e) => {
                otlp_error = Some(e);
                None
            }
        },
        None => None,
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
    {
        eprintln!("Tracing subscriber already installed: {e}");
    }

    if let Some(e) = file_error {
        tracing::warn!(
            error = %e,
            log_file = ?config.log_file,
            "Log file could not be opened, logging to stderr only"
        );
    }
    match (&provider, otlp_error) {
        (Some(_), _) => tracing::info!(
            endpoint = ?config.otlp_endpoint,
            service = %config.service_name,
            protocol = ?config.protocol,
            "OpenTelemetry OTLP tracing initialized"
        ),
        (None, Some(e)) => tracing::warn!(
            error = %e,
            endpoint = ?config.otlp_endpoint,
            "OTLP exporter failed to initialize, running without trace export"
        ),
        (None, None) => {}
    }

    TracingGuard {
        provider,
        _file_guard: file_guard,
    }
}

/// Open `path` for appending (no rotation) behind a non-blocking writer.
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("log file path has no file name: {}", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)?;

    Ok(tracing_appender::non_blocking(appender))
}
