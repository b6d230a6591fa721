// CGI script location
// Splits a CGI URL into script name and extra path info

use std::path::{Path, PathBuf};

use super::CgiError;
use crate::http::translate_path;

/// A CGI script resolved against the document root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgiScript {
    /// URL path of the script, e.g. `/notera/cgi-bin/api.cgi`
    pub script_name: String,
    /// File system path of the script
    pub script_path: PathBuf,
    /// Extra path after the script name, empty or starting with `/`
    pub path_info: String,
}

impl CgiScript {
    /// Lowercased file extension of the script, if any
    pub fn extension(&self) -> Option<String> {
        self.script_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

/// Locate the script addressed by `path` below the CGI directory `prefix`
///
/// `path` is the collapsed request path without query. Nested directories
/// under the prefix are walked as long as they exist on disk; the first
/// segment that is not a directory names the script, the rest becomes
/// `PATH_INFO`.
pub fn locate_script(root: &Path, prefix: &str, path: &str) -> Result<CgiScript, CgiError> {
    let mut dir = prefix.trim_end_matches('/').to_string();
    let mut rest = path
        .strip_prefix(dir.as_str())
        .unwrap_or(path)
        .trim_start_matches('/');

    while let Some((next, tail)) = rest.split_once('/') {
        let candidate = format!("{dir}/{next}");
        if !translate_path(root, &candidate).is_dir() {
            break;
        }
        dir = candidate;
        rest = tail;
    }

    let (script, path_info) = match rest.split_once('/') {
        Some((script, info)) => (script, format!("/{info}")),
        None => (rest, String::new()),
    };

    let script_name = format!("{dir}/{script}");
    let script_path = translate_path(root, &script_name);

    let metadata = match std::fs::metadata(&script_path) {
        Ok(m) => m,
        Err(_) => return Err(CgiError::NotFound(script_name)),
    };
    if script.is_empty() || !metadata.is_file() {
        return Err(CgiError::NotAFile(script_name));
    }

    Ok(CgiScript {
        script_name,
        script_path,
        path_info,
    })
}

/// Whether the file at `path` carries an execute permission bit
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}
