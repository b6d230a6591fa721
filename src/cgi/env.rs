// CGI/1.1 environment construction (RFC 3875 section 4.1)

use hyper::header::{HeaderMap, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HOST};
use hyper::{Method, Uri, Version};
use std::collections::BTreeMap;
use std::net::SocketAddr;

use super::CgiScript;
use crate::config::Config;
use crate::http::path::{percent_decode, translate_path};

const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Request metadata exposed to a CGI script
pub struct CgiEnvRequest<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub version: Version,
    pub headers: &'a HeaderMap,
    pub remote_addr: SocketAddr,
    pub body_len: usize,
}

/// Build the complete environment for a script invocation
///
/// The server's own environment is not inherited apart from `PATH`.
pub fn build_env(
    req: &CgiEnvRequest<'_>,
    script: &CgiScript,
    config: &Config,
) -> BTreeMap<String, String> {
    let root = &config.server.document_root;
    let mut env = BTreeMap::new();
    let mut set = |name: &str, value: String| {
        env.insert(name.to_string(), value);
    };

    set("GATEWAY_INTERFACE", "CGI/1.1".to_string());
    set("SERVER_SOFTWARE", config.http.server_name.clone());
    set("SERVER_NAME", server_name(req.headers, &config.server.host));
    set("SERVER_PORT", config.server.port.to_string());
    set("SERVER_PROTOCOL", format!("{:?}", req.version));
    set("REQUEST_METHOD", req.method.as_str().to_string());
    set(
        "REQUEST_URI",
        req.uri
            .path_and_query()
            .map_or_else(|| req.uri.path().to_string(), ToString::to_string),
    );
    set("QUERY_STRING", req.uri.query().unwrap_or_default().to_string());
    set("SCRIPT_NAME", script.script_name.clone());
    set("SCRIPT_FILENAME", script.script_path.display().to_string());
    set("DOCUMENT_ROOT", root.display().to_string());
    set("REMOTE_ADDR", req.remote_addr.ip().to_string());
    set("REMOTE_PORT", req.remote_addr.port().to_string());
    set(
        "PATH",
        std::env::var("PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string()),
    );

    if !script.path_info.is_empty() {
        set("PATH_INFO", percent_decode(&script.path_info));
        set(
            "PATH_TRANSLATED",
            translate_path(root, &script.path_info).display().to_string(),
        );
    }

    if let Some(content_type) = header_str(req.headers, &CONTENT_TYPE) {
        set("CONTENT_TYPE", content_type.to_string());
    }
    if req.body_len > 0 || req.headers.contains_key(CONTENT_LENGTH) {
        set("CONTENT_LENGTH", req.body_len.to_string());
    }
    if let Some(auth) = header_str(req.headers, &AUTHORIZATION) {
        if let Some(scheme) = auth.split_whitespace().next() {
            set("AUTH_TYPE", scheme.to_string());
        }
    }

    for name in req.headers.keys() {
        if *name == CONTENT_TYPE || *name == CONTENT_LENGTH {
            continue;
        }
        // Repeated headers are joined; values that are not visible ASCII are skipped
        let values: Vec<&str> = req
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            continue;
        }
        let var = format!(
            "HTTP_{}",
            name.as_str().to_ascii_uppercase().replace('-', "_")
        );
        set(&var, values.join(", "));
    }

    env
}

fn header_str<'a>(headers: &'a HeaderMap, name: &hyper::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Host name the client addressed, falling back to the bind host
fn server_name(headers: &HeaderMap, bind_host: &str) -> String {
    if let Some(host) = header_str(headers, &HOST) {
        let name = if host.starts_with('[') {
            // IPv6 literal, keep the brackets
            host.find(']').map_or(host, |end| &host[..=end]).to_string()
        } else {
            host.split(':').next().unwrap_or(host).to_string()
        };
        if !name.is_empty() {
            return name;
        }
    }
    if bind_host.is_empty() {
        "localhost".to_string()
    } else {
        bind_host.to_string()
    }
}
