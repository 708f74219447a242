//! Lifecycle events and the sink that receives them.
//!
//! The sink is injected (see `AppState`) so tests can record events instead
//! of logging them. Emission is a side channel: nothing a sink does can change
//! the response returned to the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};

use axum::http::StatusCode;
use serde_json::Value;

use super::snapshot::RequestSnapshot;
use crate::error::{DispatchError, MirrorError};

/// One structured record at a defined point of a request's lifecycle.
#[derive(Debug)]
pub enum MirrorEvent<'a> {
    RequestReceived {
        snapshot: &'a RequestSnapshot,
    },
    DispatchStarted {
        request_id: &'a str,
        index: usize,
        forward_url: &'a str,
    },
    DispatchCompleted {
        request_id: &'a str,
        index: usize,
        forward_url: &'a str,
        status: StatusCode,
        response_size: usize,
        latency_ms: u64,
    },
    DispatchFailed {
        request_id: &'a str,
        index: usize,
        destination: &'a str,
        error: &'a DispatchError,
        latency_ms: u64,
    },
    ForwardingFailed {
        request_id: &'a str,
        error: &'a MirrorError,
    },
}

impl MirrorEvent<'_> {
    /// Stable action name, recorded as the `action` field.
    pub fn action(&self) -> &'static str {
        match self {
            MirrorEvent::RequestReceived { .. } => "request_received",
            MirrorEvent::DispatchStarted { .. } => "forwarding_request",
            MirrorEvent::DispatchCompleted { .. } => "received_response",
            MirrorEvent::DispatchFailed { .. } => "forwarding_error",
            MirrorEvent::ForwardingFailed { .. } => "forwarding_failed",
        }
    }

    /// Destination index for per-dispatch events.
    pub fn index(&self) -> Option<usize> {
        match self {
            MirrorEvent::DispatchStarted { index, .. }
            | MirrorEvent::DispatchCompleted { index, .. }
            | MirrorEvent::DispatchFailed { index, .. } => Some(*index),
            MirrorEvent::RequestReceived { .. } | MirrorEvent::ForwardingFailed { .. } => None,
        }
    }
}

/// Receiver of lifecycle events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &MirrorEvent<'_>);
}

/// Hand `event` to `sink`, swallowing a panicking sink.
pub fn emit(sink: &dyn EventSink, event: &MirrorEvent<'_>) {
    if catch_unwind(AssertUnwindSafe(|| sink.emit(event))).is_err() {
        tracing::warn!(
            action = event.action(),
            index = ?event.index(),
            "Event sink panicked, event dropped"
        );
    }
}

/// Default sink: one `tracing` event per lifecycle record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &MirrorEvent<'_>) {
        let action = event.action();
        match event {
            MirrorEvent::RequestReceived { snapshot } => {
                let query_params = Value::Object(snapshot.query_params());
                tracing::info!(
                    action = action,
                    request_id = %snapshot.request_id(),
                    method = %snapshot.method(),
                    url = %snapshot.absolute_url(),
                    client_ip = ?snapshot.client_addr().map(|addr| addr.ip()),
                    headers = %snapshot.headers_json(),
                    query_params = %query_params,
                    body = %snapshot.body_json(),
                    "Request received"
                )
            }
            MirrorEvent::DispatchStarted {
                request_id,
                index,
                forward_url,
            } => tracing::debug!(
                action = action,
                request_id = %request_id,
                index = *index,
                forward_url = %forward_url,
                "Forwarding request"
            ),
            MirrorEvent::DispatchCompleted {
                request_id,
                index,
                forward_url,
                status,
                response_size,
                latency_ms,
            } => tracing::debug!(
                action = action,
                request_id = %request_id,
                index = *index,
                forward_url = %forward_url,
                status_code = status.as_u16(),
                response_size = *response_size,
                latency_ms = *latency_ms,
                "Received response"
            ),
            MirrorEvent::DispatchFailed {
                request_id,
                index,
                destination,
                error,
                latency_ms,
            } => tracing::error!(
                action = action,
                request_id = %request_id,
                index = *index,
                forward_url = %destination,
                error = %error,
                latency_ms = *latency_ms,
                "Forwarding error"
            ),
            MirrorEvent::ForwardingFailed { request_id, error } => tracing::error!(
                action = action,
                request_id = %request_id,
                error = ?error,
                "Forwarding failed"
            ),
        }
    }
}
