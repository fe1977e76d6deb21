// Helper functions shared by the engine adapter and the HTTP layer

use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};

use super::errors::EngineError;

/// Run command with a wall-clock timeout, collecting stdout and stderr.
///
/// The child is killed when the timeout expires or when the returned future is dropped.
pub async fn run_output_with_timeout(
    program: &str,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output, EngineError> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| EngineError::new(format!("Failed to start {}: {}", program, e)))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| EngineError::new(format!("Failed to capture stdout from {}", program)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| EngineError::new(format!("Failed to capture stderr from {}", program)))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stdout: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stderr: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });

    let waited = timeout(TokioDuration::from_secs(timeout_secs), child.wait()).await;
    match waited {
        Ok(status_res) => {
            let status = status_res
                .map_err(|e| EngineError::new(format!("Failed to wait for {}: {}", program, e)))?;
            let stdout = stdout_task
                .await
                .map_err(|e| EngineError::new(format!("stdout task failed: {}", e)))??;
            let stderr = stderr_task
                .await
                .map_err(|e| EngineError::new(format!("stderr task failed: {}", e)))??;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(EngineError::new(format!("Timed out after {}s", timeout_secs)))
        }
    }
}

/// Short stderr preview for logs.
///
/// Up to two `ERROR:` lines joined with ` | `; without any, the last non-empty
/// line capped at 200 chars.
pub fn error_preview(stderr: &str) -> String {
    let important: Vec<&str> = stderr
        .lines()
        .map(|l| l.trim())
        .filter(|l| l.starts_with("ERROR:"))
        .take(2)
        .collect();

    if !important.is_empty() {
        return important.join(" | ");
    }

    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("Unknown error")
        .chars()
        .take(200)
        .collect()
}

/// Human-readable download name: alphanumerics, space, dot, dash and underscore only.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `Content-Disposition` for an attachment named `<stem>.<ext>`.
///
/// `filename` carries an ASCII-only fallback; the full name goes in `filename*`
/// (RFC 6266 / RFC 5987).
pub fn attachment_disposition(stem: &str, ext: &str) -> String {
    let ascii: String = stem
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && !matches!(c, '"' | '\\'))
        .collect();
    let ascii = match ascii.trim() {
        "" => "download",
        trimmed => trimmed,
    };
    let full = format!("{}.{}", stem, ext);
    format!(
        "attachment; filename=\"{}.{}\"; filename*=UTF-8''{}",
        ascii,
        ext,
        urlencoding::encode(&full)
    )
}
