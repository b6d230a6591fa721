use std::sync::Arc;

mod cgi;
mod config;
mod handler;
mod http;
mod logger;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = config::Config::load()?;
    cfg.resolve_document_root()?;
    logger::init(&cfg)?;

    // Build the Tokio runtime, sized by the `workers` setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr, cfg.performance.backlog)?;
    logger::log_server_start(&listener.local_addr()?, &cfg);

    let state = Arc::new(config::AppState::new(cfg));

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(
            listener,
            state,
            server::shutdown_signal(),
        ))
        .await?;
    Ok(())
}
