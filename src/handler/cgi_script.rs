//! CGI request handling
//!
//! Bridges a dispatched request to the CGI gateway and maps gateway
//! failures onto HTTP responses.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::time::Duration;

use crate::cgi::{self, CgiEnvRequest, CgiError, ScriptRun};
use crate::config::Config;
use crate::http;
use crate::logger;

/// Run the CGI script addressed by `path` under the CGI directory `prefix`
///
/// `path` is the normalized, collapsed request path.
pub async fn serve(
    req: &Request<Bytes>,
    config: &Config,
    prefix: &str,
    path: &str,
    remote_addr: SocketAddr,
) -> Response<Full<Bytes>> {
    match execute(req, config, prefix, path, remote_addr).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e, config.cgi.verbose_errors),
    }
}

async fn execute(
    req: &Request<Bytes>,
    config: &Config,
    prefix: &str,
    path: &str,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, CgiError> {
    let root = &config.server.document_root;
    let script = cgi::locate_script(root, prefix, path)?;

    let interpreter = script
        .extension()
        .and_then(|ext| config.cgi.interpreters.get(&ext))
        .map(String::as_str);
    if interpreter.is_none() && !cgi::is_executable(&script.script_path) {
        return Err(CgiError::NotExecutable(script.script_name));
    }

    let env = cgi::build_env(
        &CgiEnvRequest {
            method: req.method(),
            uri: req.uri(),
            version: req.version(),
            headers: req.headers(),
            remote_addr,
            body_len: req.body().len(),
        },
        &script,
        config,
    );

    let stdout = cgi::run_script(ScriptRun {
        script: &script,
        method: req.method().as_str(),
        interpreter,
        env,
        working_dir: root,
        body: req.body().clone(),
        timeout: (config.cgi.timeout > 0).then(|| Duration::from_secs(config.cgi.timeout)),
    })
    .await?;

    let output = cgi::parse_output(stdout)?;
    Ok(output.into_response(*req.method() == Method::HEAD))
}

fn error_response(err: &CgiError, verbose: bool) -> Response<Full<Bytes>> {
    match err.status() {
        StatusCode::NOT_FOUND => http::build_404_response(&err.to_string()),
        StatusCode::FORBIDDEN => http::build_403_response(&err.to_string()),
        _ => {
            let detail = err.detail();
            // Exit status and timeouts are already logged by the runner
            if matches!(err, CgiError::MalformedOutput(_) | CgiError::Spawn { .. }) {
                logger::log_error(&detail);
            }
            http::build_500_response(verbose.then_some(detail.as_str()))
        }
    }
}
