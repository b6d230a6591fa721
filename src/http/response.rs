//! HTTP response building module
//!
//! Builders for the status code responses the server emits.
//! Error responses carry their message verbatim as a `text/plain` body.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

/// Build an error response whose body is exactly `message`
pub fn build_error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Length", message.len())
        .body(Full::new(Bytes::from(message.to_owned())))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from(message.to_owned())))
        })
}

/// Build 403 Forbidden response
pub fn build_403_response(message: &str) -> Response<Full<Bytes>> {
    build_error_response(StatusCode::FORBIDDEN, message)
}

/// Build 404 Not Found response
pub fn build_404_response(message: &str) -> Response<Full<Bytes>> {
    build_error_response(StatusCode::NOT_FOUND, message)
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    build_error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
}

/// Build 500 Internal Server Error response
///
/// `detail` is appended only when verbose errors are enabled by the caller.
pub fn build_500_response(detail: Option<&str>) -> Response<Full<Bytes>> {
    let message = match detail {
        Some(detail) => format!("CGI script error\n\n{detail}"),
        None => "CGI script error".to_string(),
    };
    build_error_response(StatusCode::INTERNAL_SERVER_ERROR, &message)
}

/// Build 501 Not Implemented response
pub fn build_501_response(message: &str) -> Response<Full<Bytes>> {
    build_error_response(StatusCode::NOT_IMPLEMENTED, message)
}

/// Build 301 redirect response
pub fn build_301_response(location: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header("Location", location)
        .header("Content-Length", 0)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("301", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header("ETag", etag)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("304", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build generic HTML response
pub fn build_html_response(content: String, is_head: bool) -> Response<Full<Bytes>> {
    let content_length = content.len();
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(content)
    };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Content-Length", content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("HTML", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build a static file response with validators
pub fn build_file_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    last_modified: Option<&str>,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .header("ETag", etag);
    if let Some(last_modified) = last_modified {
        builder = builder.header("Last-Modified", last_modified);
    }

    builder.body(Full::new(body)).unwrap_or_else(|e| {
        log_build_error("200", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_error_body_is_message() {
        let resp = build_501_response("Can only PUT to CGI scripts");
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(resp.headers()["content-length"], "27");
        assert_eq!(body_string(resp).await, "Can only PUT to CGI scripts");
    }

    #[tokio::test]
    async fn test_500_detail_is_optional() {
        assert_eq!(body_string(build_500_response(None)).await, "CGI script error");
        let body = body_string(build_500_response(Some("exit status: 3"))).await;
        assert!(body.contains("exit status: 3"));
    }

    #[tokio::test]
    async fn test_head_file_response_has_no_body() {
        let resp = build_file_response(
            Bytes::from_static(b"hello"),
            "text/plain",
            "\"e\"",
            Some("Sun, 06 Nov 1994 08:49:37 GMT"),
            true,
        );
        assert_eq!(resp.headers()["content-length"], "5");
        assert_eq!(resp.headers()["last-modified"], "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(body_string(resp).await, "");
    }

    #[test]
    fn test_redirect_location() {
        let resp = build_301_response("/notera/static/");
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()["location"], "/notera/static/");
    }
}
