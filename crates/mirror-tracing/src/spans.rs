//! Span builder helpers for mirror-proxy instrumentation.

/// Create a tracing span for one inbound request and its whole fan-out.
///
/// Usage: `let span = mirror_request_span!(request_id, method, path);`
///
/// Recorded later by the handler:
/// - `status`: status code sent back to the caller
/// - `latency_ms`: milliseconds from receipt to response
#[macro_export]
macro_rules! mirror_request_span {
    ($request_id:expr, $method:expr, $path:expr) => {
        tracing::info_span!(
            "mirror_request",
            request_id = %$request_id,
            method = %$method,
            path = %$path,
            destinations = tracing::field::Empty,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    };
}

/// Create a tracing span for one outbound dispatch.
///
/// `index` is the destination's position; 0 is the primary.
#[macro_export]
macro_rules! dispatch_span {
    ($request_id:expr, $index:expr, $destination:expr) => {
        tracing::info_span!(
            "dispatch",
            request_id = %$request_id,
            index = $index,
            primary = ($index == 0),
            destination = %$destination,
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    };
}
