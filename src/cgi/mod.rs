//! CGI gateway
//!
//! Everything needed to run a request through a CGI/1.1 script:
//! locating the script under a CGI directory, building its environment,
//! executing it and parsing what it prints.

mod env;
mod output;
mod process;
mod script;

pub use env::{build_env, CgiEnvRequest};
pub use output::parse_output;
pub use process::{run_script, ScriptRun};
pub use script::{is_executable, locate_script, CgiScript};

use hyper::StatusCode;
use std::process::ExitStatus;
use thiserror::Error;

/// Failures while locating or running a CGI script
#[derive(Debug, Error)]
pub enum CgiError {
    #[error("No such CGI script ({0})")]
    NotFound(String),

    #[error("CGI script is not a plain file ({0})")]
    NotAFile(String),

    #[error("CGI script is not executable ({0})")]
    NotExecutable(String),

    #[error("Failed to execute CGI script {script}: {source}")]
    Spawn {
        script: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CGI script {script} timed out after {secs}s")]
    Timeout { script: String, secs: u64 },

    #[error("CGI script {script} exited with {status}")]
    Exit {
        script: String,
        status: ExitStatus,
        stderr: Vec<u8>,
    },

    #[error("Malformed CGI output: {0}")]
    MalformedOutput(String),
}

impl CgiError {
    /// HTTP status this error is reported with
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotAFile(_) | Self::NotExecutable(_) => StatusCode::FORBIDDEN,
            Self::Spawn { .. }
            | Self::Timeout { .. }
            | Self::Exit { .. }
            | Self::MalformedOutput(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Operator-facing diagnostic, including script stderr when available
    pub fn detail(&self) -> String {
        match self {
            Self::Exit { stderr, .. } if !stderr.is_empty() => {
                format!("{self}\n\n{}", String::from_utf8_lossy(stderr))
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status() {
        assert_eq!(
            CgiError::NotFound("/cgi-bin/x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CgiError::NotExecutable("/cgi-bin/x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            CgiError::MalformedOutput("no header".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CgiError::NotFound("/notera/cgi-bin/nope.cgi".into()).to_string(),
            "No such CGI script (/notera/cgi-bin/nope.cgi)"
        );
        assert_eq!(
            CgiError::NotAFile("/notera/cgi-bin/".into()).to_string(),
            "CGI script is not a plain file (/notera/cgi-bin/)"
        );
    }
}
