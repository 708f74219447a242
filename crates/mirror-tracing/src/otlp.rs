//! OTLP exporter setup.

use anyhow::Result;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;

use crate::config::{OtlpProtocol, TracingConfig};

/// Build a tracer provider exporting to `endpoint` with a batch exporter.
///
/// Returns Err if the exporter cannot be built; the caller decides whether
/// to run without it.
pub(crate) fn build_provider(config: &TracingConfig, endpoint: &str) -> Result<SdkTracerProvider> {
    let otlp_exporter = match config.protocol {
        OtlpProtocol::Grpc => opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()?,
        OtlpProtocol::Http => opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()?,
    };

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(otlp_exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder_empty()
                .with_service_name(config.service_name.clone())
                .build(),
        )
        .build();

    Ok(provider)
}
