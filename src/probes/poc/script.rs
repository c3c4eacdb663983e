use std::io::Write as _;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use crate::errors::EngineError;

/// Grace period for output readers once the child has exited.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptExit {
    Exited(Option<i32>),
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ScriptRun {
    pub exit: ScriptExit,
    /// Interleaved stdout and stderr.
    pub output: String,
}

type SharedOutput = Arc<Mutex<Vec<u8>>>;

fn drain<R: AsyncRead + Unpin + Send + 'static>(mut reader: R, sink: SharedOutput) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut out) = sink.lock() {
                        out.extend_from_slice(&buf[..n]);
                    }
                }
            }
        }
    })
}

/// Run `script` with `interpreter`, passing the target as the first argument
/// and in `TARGET`. The child is killed on timeout or cancellation.
pub async fn run_script(
    interpreter: &Path,
    script: &str,
    target: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ScriptRun, EngineError> {
    let mut file = tempfile::Builder::new()
        .prefix("jackal-poc-")
        .suffix(".py")
        .tempfile()?;
    file.write_all(script.as_bytes())?;
    file.flush()?;

    let mut child = Command::new(interpreter)
        .arg(file.path())
        .arg(target)
        .env("TARGET", target)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            EngineError::Execution(format!("Failed to launch {}: {}", interpreter.display(), e))
        })?;
    debug!(interpreter = %interpreter.display(), pid = ?child.id(), "PoC script started");

    let output: SharedOutput = Arc::new(Mutex::new(Vec::new()));
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(drain(stdout, output.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(drain(stderr, output.clone()));
    }

    let exit = tokio::select! {
        status = child.wait() => ScriptExit::Exited(status?.code()),
        _ = tokio::time::sleep(timeout) => ScriptExit::TimedOut,
        _ = cancel.cancelled() => ScriptExit::Cancelled,
    };
    if !matches!(exit, ScriptExit::Exited(_)) {
        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill PoC script");
        }
    }

    // A grandchild may still hold the pipes open
    for reader in readers {
        let _ = tokio::time::timeout(DRAIN_GRACE, reader).await;
    }

    let bytes = match output.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    Ok(ScriptRun {
        exit,
        output: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    #[tokio::test]
    async fn test_captures_output_and_target() {
        let run = run_script(
            &sh(),
            "echo \"hello $1\"; echo \"env $TARGET\" >&2; exit 3",
            "http://h.test",
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(run.exit, ScriptExit::Exited(Some(3)));
        assert!(run.output.contains("hello http://h.test"));
        assert!(run.output.contains("env http://h.test"));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let started = std::time::Instant::now();
        let run = run_script(&sh(), "sleep 30", "t", Duration::from_millis(200), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(run.exit, ScriptExit::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_launch_failure() {
        let err = run_script(
            Path::new("/nonexistent/interpreter"),
            "print(1)",
            "t",
            Duration::from_secs(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
    }
}
