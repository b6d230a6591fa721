// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub cgi: CgiConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
}

/// Server configuration
///
/// Built once at startup and shared read-only by every request.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind address, empty string means all interfaces
    pub host: String,
    pub port: u16,
    /// Base directory static paths and CGI scripts are resolved against
    pub document_root: PathBuf,
    /// URL path prefixes whose targets are executed as CGI scripts
    pub cgi_directories: Vec<String>,
    pub workers: Option<usize>,
}

/// CGI execution configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CgiConfig {
    /// Include script diagnostics (stderr, exit status) in 500 responses
    pub verbose_errors: bool,
    /// Seconds a script may run before it is killed, 0 disables the limit
    pub timeout: u64,
    /// Interpreter per script extension, e.g. `py = "python3"`
    #[serde(default)]
    pub interpreters: HashMap<String, String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "common".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
    pub backlog: i32,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
    pub index_files: Vec<String>,
}

impl ServerConfig {
    /// Whether `path` lies under one of the CGI directory prefixes
    ///
    /// `path` must already be collapsed. A prefix matches anything below it,
    /// but neither the bare directory (served statically, which redirects
    /// to the trailing-slash form) nor a sibling sharing the same leading text.
    pub fn cgi_prefix_for(&self, path: &str) -> Option<&str> {
        self.cgi_directories
            .iter()
            .map(|dir| dir.trim_end_matches('/'))
            .find(|dir| {
                !dir.is_empty()
                    && path
                        .strip_prefix(dir)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(dirs: &[&str]) -> ServerConfig {
        ServerConfig {
            host: String::new(),
            port: 8000,
            document_root: PathBuf::from("."),
            cgi_directories: dirs.iter().map(ToString::to_string).collect(),
            workers: None,
        }
    }

    #[test]
    fn test_cgi_prefix_match() {
        let cfg = server(&["/notera/cgi-bin"]);
        assert_eq!(
            cfg.cgi_prefix_for("/notera/cgi-bin/api.cgi"),
            Some("/notera/cgi-bin")
        );
        assert_eq!(cfg.cgi_prefix_for("/notera/cgi-bin"), None);
        assert_eq!(cfg.cgi_prefix_for("/notera/cgi-bin/"), Some("/notera/cgi-bin"));
        assert_eq!(cfg.cgi_prefix_for("/notera/static/readme.txt"), None);
    }

    #[test]
    fn test_cgi_prefix_requires_segment_boundary() {
        let cfg = server(&["/cgi-bin"]);
        assert_eq!(cfg.cgi_prefix_for("/cgi-binary/x"), None);
        assert_eq!(cfg.cgi_prefix_for("/cgi-bin/x"), Some("/cgi-bin"));
    }

    #[test]
    fn test_cgi_prefix_any_of_many() {
        let cfg = server(&["/cgi-bin/", "/htbin"]);
        assert_eq!(cfg.cgi_prefix_for("/htbin/test.sh"), Some("/htbin"));
        assert_eq!(cfg.cgi_prefix_for("/cgi-bin/test.sh"), Some("/cgi-bin"));
    }
}
