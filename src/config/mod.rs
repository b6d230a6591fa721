// Configuration module entry point
// Loads the startup configuration and holds the shared runtime state

mod state;
mod types;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

// Re-export public types
pub use state::AppState;
pub use types::Config;

/// Default configuration file, looked up in the working directory
const DEFAULT_CONFIG_FILE: &str = "config";

/// Environment variable prefix, e.g. `CGISERVER_SERVER__PORT=9000`
const ENV_PREFIX: &str = "CGISERVER";

impl Config {
    /// Load configuration from the default config file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from specified file path (without extension)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "")?
            .set_default("server.port", 8000)?
            .set_default("server.document_root", "..")?
            .set_default("server.cgi_directories", vec!["/notera/cgi-bin"])?
            .set_default("cgi.verbose_errors", false)?
            .set_default("cgi.timeout", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("performance.backlog", 128)?
            .set_default("http.server_name", "cgi_webserver/0.1")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("http.index_files", vec!["index.html", "index.htm"])?
            .build()?;

        settings.try_deserialize()
    }

    /// Resolve the document root against the starting directory
    ///
    /// The root must exist; it is stored as an absolute, canonical path so
    /// later containment checks compare like with like.
    pub fn resolve_document_root(&mut self) -> std::io::Result<()> {
        let root = Path::new(&self.server.document_root).canonicalize()?;
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Document root is not a directory: {}", root.display()),
            ));
        }
        self.server.document_root = root;
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        if self.server.host.is_empty() {
            return Ok(SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                self.server.port,
            ));
        }
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
