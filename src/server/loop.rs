// Server loop module
// Accepts connections until a shutdown signal arrives

use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Accept connections until `shutdown` resolves
///
/// Connections already being served keep running on the `LocalSet`
/// until they finish or the runtime is dropped.
pub async fn start_server_loop<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = std::io::Result<&'static str>>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &state),
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            signal = &mut shutdown => {
                signal?;
                let active = state.active_connections();
                if active > 0 {
                    logger::log_info(&format!("Abandoning {active} active connection(s)"));
                }
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::listener::create_listener;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn roundtrip(addr: std::net::SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    #[tokio::test]
    async fn test_serves_requests_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("notera/cgi-bin")).unwrap();
        std::fs::write(
            dir.path().join("notera/cgi-bin/api.cgi"),
            "printf 'Content-type: application/json\\n\\n'\ncat\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello").unwrap();

        let mut cfg = Config::load_from("does-not-exist").unwrap();
        cfg.server.document_root = dir.path().canonicalize().unwrap();
        cfg.cgi.interpreters.insert("cgi".into(), "/bin/sh".into());
        cfg.logging.access_log = false;

        let listener = create_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(AppState::new(cfg));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let shutdown = async move {
            let _ = stop_rx.await;
            Ok::<_, std::io::Error>("test")
        };

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let server = tokio::task::spawn_local(start_server_loop(
                    listener,
                    Arc::clone(&state),
                    shutdown,
                ));

                let response = roundtrip(
                    addr,
                    "PUT /notera/cgi-bin/api.cgi HTTP/1.1\r\nHost: localhost\r\n\
                     Content-Length: 9\r\nConnection: close\r\n\r\n{\"k\":\"v\"}",
                )
                .await;
                assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
                assert!(response.contains("content-type: application/json"));
                assert!(response.ends_with("{\"k\":\"v\"}"));

                let response = roundtrip(
                    addr,
                    "PUT /hello.txt HTTP/1.1\r\nHost: localhost\r\n\
                     Content-Length: 1\r\nConnection: close\r\n\r\nx",
                )
                .await;
                assert!(response.starts_with("HTTP/1.1 501 Not Implemented\r\n"), "{response}");
                assert!(response.ends_with("Can only PUT to CGI scripts"));

                stop_tx.send(()).unwrap();
                tokio::time::timeout(Duration::from_secs(5), server)
                    .await
                    .unwrap()
                    .unwrap()
                    .unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::load_from("does-not-exist").unwrap();
        cfg.server.document_root = dir.path().canonicalize().unwrap();
        cfg.http.max_body_size = 4;
        cfg.logging.access_log = false;

        let listener = create_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(AppState::new(cfg));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let server = tokio::task::spawn_local(start_server_loop(listener, state, async move {
                    let _ = stop_rx.await;
                    Ok::<_, std::io::Error>("test")
                }));

                let response = roundtrip(
                    addr,
                    "PUT /notera/cgi-bin/api.cgi HTTP/1.1\r\nHost: localhost\r\n\
                     Content-Length: 10\r\nConnection: close\r\n\r\n0123456789",
                )
                .await;
                assert!(response.starts_with("HTTP/1.1 413 "), "{response}");

                stop_tx.send(()).unwrap();
                server.await.unwrap().unwrap();
            })
            .await;
    }
}
