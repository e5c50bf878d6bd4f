//! The `exec_command` host function.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use reglet_core::wire::{ExecCommandRequest, ExecCommandResponse, HttpError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Spawn a subprocess and capture its output, killed at the deadline.
///
/// The effective timeout is the request's when set, else the remaining
/// call budget, else 30 seconds.
pub fn exec_command(
    request: &ExecCommandRequest,
    remaining: Option<Duration>,
) -> ExecCommandResponse {
    if request.command.is_empty() {
        return error_response("INVALID_REQUEST", "command is required");
    }

    let timeout = if request.timeout_ms > 0 {
        Duration::from_millis(request.timeout_ms)
    } else {
        remaining.unwrap_or(DEFAULT_TIMEOUT)
    };

    let mut child = match Command::new(&request.command)
        .args(&request.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return error_response("SPAWN_FAILED", &format!("{}: {e}", request.command));
        }
    };

    // Pipes drain on their own threads so a chatty child cannot deadlock
    // against a full pipe buffer while we wait on it.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || drain(stdout));
    let stderr_thread = std::thread::spawn(move || drain(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                let mut response = error_response("EXEC_FAILED", &e.to_string());
                response.exit_code = -1;
                return response;
            }
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    match status {
        Some(status) => ExecCommandResponse {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
            error: None,
        },
        None => ExecCommandResponse {
            exit_code: -1,
            stdout,
            stderr,
            error: Some(HttpError {
                code: "TIMEOUT".to_string(),
                message: format!("command timed out after {}ms", timeout.as_millis()),
            }),
        },
    }
}

fn drain(pipe: Option<impl Read>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

fn error_response(code: &str, message: &str) -> ExecCommandResponse {
    ExecCommandResponse {
        exit_code: -1,
        error: Some(HttpError {
            code: code.to_string(),
            message: message.to_string(),
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_is_invalid() {
        let response = exec_command(&ExecCommandRequest {
            command: String::new(),
            args: vec![],
            timeout_ms: 0,
        }, None);
        assert_eq!(response.error.unwrap().code, "INVALID_REQUEST");
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_and_exit_code() {
        let response = exec_command(&ExecCommandRequest {
            command: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), "echo out; echo err >&2".to_string()],
            timeout_ms: 5000,
        }, None);

        assert!(response.error.is_none());
        assert_eq!(response.exit_code, 0);
        assert_eq!(response.stdout.trim(), "out");
        assert_eq!(response.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_code() {
        let response = exec_command(&ExecCommandRequest {
            command: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), "exit 3".to_string()],
            timeout_ms: 5000,
        }, None);
        assert_eq!(response.exit_code, 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_the_child() {
        let start = Instant::now();
        let response = exec_command(&ExecCommandRequest {
            command: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), "sleep 30".to_string()],
            timeout_ms: 100,
        }, None);

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(response.exit_code, -1);
        assert_eq!(response.error.unwrap().code, "TIMEOUT");
    }

    #[test]
    fn test_missing_binary_is_spawn_failure() {
        let response = exec_command(&ExecCommandRequest {
            command: "/no/such/binary".to_string(),
            args: vec![],
            timeout_ms: 1000,
        }, None);
        assert_eq!(response.error.unwrap().code, "SPAWN_FAILED");
    }
}
