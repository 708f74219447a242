//! Translate the primary's reply into the response sent to the caller.

use axum::body::Body;
use axum::http::header::{HeaderName, CONTENT_ENCODING, CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::HeaderMap;
use axum::response::Response;

use super::dispatch::UpstreamResponse;

/// Framing headers that describe the upstream wire encoding, not the body we
/// hold. The client has already decoded and de-chunked it, so these would be
/// stale for the caller.
const STALE_FRAMING_HEADERS: [HeaderName; 3] = [CONTENT_ENCODING, CONTENT_LENGTH, TRANSFER_ENCODING];

/// Remove the stale framing headers, keeping everything else (multi-valued
/// headers and `Content-Type` included).
pub fn sanitize_headers(mut headers: HeaderMap) -> HeaderMap {
    for name in &STALE_FRAMING_HEADERS {
        headers.remove(name);
    }
    headers
}

/// Status and body verbatim; headers sanitized. `Content-Type` is the
/// primary's own and stays absent if the primary sent none.
pub fn into_client_response(upstream: UpstreamResponse) -> Response {
    let UpstreamResponse {
        status,
        headers,
        body,
    } = upstream;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = sanitize_headers(headers);
    response
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use bytes::Bytes;

    use super::*;

    fn upstream(status: StatusCode, headers: &[(&'static str, &'static str)], body: &'static str) -> UpstreamResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, value.parse().unwrap());
        }
        UpstreamResponse {
            status,
            headers: map,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_sanitize_strips_framing_headers_only() {
        let primary = upstream(
            StatusCode::OK,
            &[
                ("content-encoding", "gzip"),
                ("content-length", "123"),
                ("transfer-encoding", "chunked"),
                ("content-type", "application/json"),
                ("x-trace-id", "trace-42"),
                ("set-cookie", "a=1"),
                ("set-cookie", "b=2"),
            ],
            "{}",
        );

        let headers = sanitize_headers(primary.headers);
        assert!(headers.get("content-encoding").is_none());
        assert!(headers.get("content-length").is_none());
        assert!(headers.get("transfer-encoding").is_none());
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["x-trace-id"], "trace-42");
        assert_eq!(headers.get_all("set-cookie").iter().count(), 2);
    }

    #[tokio::test]
    async fn test_status_and_body_are_verbatim() {
        let primary = upstream(
            StatusCode::NOT_FOUND,
            &[("content-type", "application/json"), ("content-length", "19")],
            r#"{"msg":"not found"}"#,
        );

        let response = into_client_response(primary);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert!(response.headers().get("content-length").is_none());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), br#"{"msg":"not found"}"#);
    }

    #[test]
    fn test_missing_content_type_stays_missing() {
        let primary = upstream(StatusCode::NO_CONTENT, &[("x-trace-id", "t")], "");

        let response = into_client_response(primary);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get("content-type").is_none());
    }
}
