// CGI process execution
// One child process per request, killed when the request is dropped

use hyper::body::Bytes;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{CgiError, CgiScript};
use crate::logger;

/// Everything needed to run one script invocation
pub struct ScriptRun<'a> {
    pub script: &'a CgiScript,
    pub method: &'a str,
    /// Program the script is handed to, `None` executes the script itself
    pub interpreter: Option<&'a str>,
    pub env: BTreeMap<String, String>,
    pub working_dir: &'a Path,
    pub body: Bytes,
    pub timeout: Option<Duration>,
}

/// Run a CGI script and return what it wrote to stdout
///
/// The request body is fed to stdin while stdout and stderr are drained, so
/// scripts that interleave reading and writing cannot deadlock. A non-zero
/// exit status is an error; stderr is logged either way.
pub async fn run_script(run: ScriptRun<'_>) -> Result<Vec<u8>, CgiError> {
    let script_name = run.script.script_name.clone();

    let mut command = match run.interpreter {
        Some(interpreter) => {
            let mut cmd = Command::new(interpreter);
            cmd.arg(&run.script.script_path);
            cmd
        }
        None => Command::new(&run.script.script_path),
    };
    command
        .env_clear()
        .envs(&run.env)
        .current_dir(run.working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    logger::log_cgi_spawn(&script_name, run.method, run.body.len());
    let mut child = command.spawn().map_err(|source| CgiError::Spawn {
        script: script_name.clone(),
        source,
    })?;

    let stdin = child.stdin.take();
    let body = run.body;
    let feed_stdin = async move {
        if let Some(mut stdin) = stdin {
            // Scripts may exit without reading their input
            if let Err(e) = stdin.write_all(&body).await {
                logger::log_debug(&format!("CGI stdin closed early: {e}"));
            }
        }
    };
    let execution = async {
        let ((), output) = tokio::join!(feed_stdin, child.wait_with_output());
        output
    };

    let output = match run.timeout {
        Some(limit) => match tokio::time::timeout(limit, execution).await {
            Ok(output) => output,
            Err(_) => {
                logger::log_error(&format!(
                    "[CGI] {script_name} killed after {}s",
                    limit.as_secs()
                ));
                return Err(CgiError::Timeout {
                    script: script_name,
                    secs: limit.as_secs(),
                });
            }
        },
        None => execution.await,
    }
    .map_err(|source| CgiError::Spawn {
        script: script_name.clone(),
        source,
    })?;

    logger::log_cgi_exit(&script_name, output.status, &output.stderr);
    if !output.status.success() {
        return Err(CgiError::Exit {
            script: script_name,
            status: output.status,
            stderr: output.stderr,
        });
    }

    Ok(output.stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn sh_script(dir: &Path, name: &str, body: &str) -> CgiScript {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        CgiScript {
            script_name: format!("/cgi-bin/{name}"),
            script_path: path,
            path_info: String::new(),
        }
    }

    fn run<'a>(script: &'a CgiScript, dir: &'a Path, body: &'static [u8]) -> ScriptRun<'a> {
        let mut env = BTreeMap::new();
        env.insert("REQUEST_METHOD".to_string(), "PUT".to_string());
        ScriptRun {
            script,
            method: "PUT",
            interpreter: Some("/bin/sh"),
            env,
            working_dir: dir,
            body: Bytes::from_static(body),
            timeout: Some(Duration::from_secs(10)),
        }
    }

    #[tokio::test]
    async fn test_stdin_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let script = sh_script(dir.path(), "echo.cgi", "printf 'Content-Type: text/plain\\n\\n'\ncat\n");
        let stdout = run_script(run(&script, dir.path(), b"{\"k\":\"v\"}\n"))
            .await
            .unwrap();
        assert_eq!(stdout, b"Content-Type: text/plain\n\n{\"k\":\"v\"}\n");
    }

    #[tokio::test]
    async fn test_environment_is_passed_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let script = sh_script(
            dir.path(),
            "env.cgi",
            "printf 'Content-Type: text/plain\\n\\n%s|%s' \"$REQUEST_METHOD\" \"${HOME:-unset}\"\n",
        );
        let stdout = run_script(run(&script, dir.path(), b"")).await.unwrap();
        assert_eq!(stdout, b"Content-Type: text/plain\n\nPUT|unset");
    }

    #[tokio::test]
    async fn test_working_directory_is_document_root() {
        let dir = tempfile::tempdir().unwrap();
        let script = sh_script(dir.path(), "pwd.cgi", "printf '\\n'\npwd -P\n");
        let stdout = run_script(run(&script, dir.path(), b"")).await.unwrap();
        let expected = format!("\n{}\n", dir.path().canonicalize().unwrap().display());
        assert_eq!(String::from_utf8(stdout).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = sh_script(dir.path(), "fail.cgi", "echo 'database locked' >&2\nexit 3\n");
        let err = run_script(run(&script, dir.path(), b"")).await.unwrap_err();
        match err {
            CgiError::Exit { status, ref stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, b"database locked\n");
                assert!(err.detail().contains("database locked"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = sh_script(dir.path(), "hang.cgi", "sleep 30\n");
        let mut args = run(&script, dir.path(), b"");
        args.timeout = Some(Duration::from_millis(200));
        let err = run_script(args).await.unwrap_err();
        assert!(matches!(err, CgiError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = CgiScript {
            script_name: "/cgi-bin/ghost.cgi".to_string(),
            script_path: PathBuf::from("/nonexistent/ghost.cgi"),
            path_info: String::new(),
        };
        let mut args = run(&script, dir.path(), b"");
        args.interpreter = None;
        let err = run_script(args).await.unwrap_err();
        assert!(matches!(err, CgiError::Spawn { .. }));
    }
}
