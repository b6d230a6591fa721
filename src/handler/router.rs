//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: body collection, the method
//! table and dispatch to either the CGI gateway or static file serving.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{HeaderName, CONTENT_LENGTH, REFERER, USER_AGENT};
use hyper::{Method, Request, Response, StatusCode, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{AppState, Config};
use crate::handler::{cgi_script, static_files};
use crate::http::{self, collapse_path, path::normalize_percent_encoding};
use crate::logger::{self, AccessLogEntry};

/// What a request is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Cgi,
    Static,
    NotImplemented,
}

/// Method table
///
/// GET, HEAD and POST go to CGI on CGI paths and to static serving
/// elsewhere. PUT is only accepted on CGI paths. Everything else is 501.
pub fn resolve(method: &Method, is_cgi: bool) -> Dispatch {
    match *method {
        Method::GET | Method::HEAD | Method::POST if is_cgi => Dispatch::Cgi,
        Method::GET | Method::HEAD | Method::POST => Dispatch::Static,
        Method::PUT if is_cgi => Dispatch::Cgi,
        _ => Dispatch::NotImplemented,
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let config = &state.config;

    let mut entry = config.logging.access_log.then(|| {
        let mut entry = access_entry(&req, remote_addr);
        entry.cgi = config
            .server
            .cgi_prefix_for(&routing_path(req.uri().path()))
            .is_some();
        entry
    });

    let response = match collect_body(req, config.http.max_body_size).await {
        Ok(req) => dispatch(&req, config, remote_addr).await,
        Err(resp) => resp,
    };

    if let Some(ref mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &config.logging.access_log_format);
    }

    Ok(response)
}

/// Route an already collected request
///
/// The path is normalized before the CGI prefix test so that
/// `/notera/cgi%2Dbin/api.cgi` and `/notera/./cgi-bin/api.cgi` both reach
/// the script.
pub async fn dispatch(
    req: &Request<Bytes>,
    config: &Config,
    remote_addr: SocketAddr,
) -> Response<Full<Bytes>> {
    let path = routing_path(req.uri().path());
    let cgi_prefix = config.server.cgi_prefix_for(&path);

    match resolve(req.method(), cgi_prefix.is_some()) {
        Dispatch::Cgi => {
            let prefix = cgi_prefix.unwrap_or_default();
            cgi_script::serve(req, config, prefix, &path, remote_addr).await
        }
        Dispatch::Static => static_files::serve(req, config, &path).await,
        Dispatch::NotImplemented => {
            let method = req.method();
            logger::log_warning(&format!(
                "Method not implemented: {method} {}",
                req.uri().path()
            ));
            if cgi_prefix.is_some() {
                http::build_501_response(&format!("Unsupported method ('{method}')"))
            } else {
                http::build_501_response("Can only PUT to CGI scripts")
            }
        }
    }
}

fn routing_path(raw: &str) -> String {
    collapse_path(&normalize_percent_encoding(raw))
}

/// Read the whole request body, bounded by `max_body_size`
async fn collect_body(
    req: Request<Incoming>,
    max_body_size: u64,
) -> Result<Request<Bytes>, Response<Full<Bytes>>> {
    if let Some(size) = declared_length(&req) {
        if size > max_body_size {
            logger::log_error(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            return Err(http::build_413_response());
        }
    }

    let (parts, body) = req.into_parts();
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(Request::from_parts(parts, collected.to_bytes())),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_error(&format!(
                "Request body exceeded {max_body_size} bytes while streaming"
            ));
            Err(http::build_413_response())
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            Err(http::response::build_error_response(
                StatusCode::BAD_REQUEST,
                "Bad request body",
            ))
        }
    }
}

fn declared_length<B>(req: &Request<B>) -> Option<u64> {
    let value = req.headers().get(CONTENT_LENGTH)?;
    match value.to_str().ok().and_then(|s| s.trim().parse::<u64>().ok()) {
        Some(size) => Some(size),
        None => {
            logger::log_warning("Invalid Content-Length header, skipping size check");
            None
        }
    }
}

fn access_entry<B>(req: &Request<B>, remote_addr: SocketAddr) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        remote_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
    .to_string();
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry
}
