//! Logging and OTLP tracing setup for mirror-proxy.

pub mod config;
mod otlp;
pub mod spans;
mod subscriber;

pub use config::{OtlpProtocol, TracingConfig};
pub use subscriber::{init_tracing, TracingGuard};
