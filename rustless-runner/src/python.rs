//! Python backend
//!
//! Holds one persistent interpreter per runner instance. The interpreter
//! loads the handler and keeps serving invocation lines over stdin/stdout;
//! the payload sentinel separates results from handler print output.

use crate::framing::{classify_line, FramedLine};
use crate::function::FunctionConfig;
use crate::runner::{Runner, RunnerError};
use crate::sink::{LogSink, TracingSink};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

/// Bridging script executed inside the interpreter. Its counterpart
/// contract: one JSON request line in, one sentinel-wrapped JSON result
/// line out, resident across invocations.
const BRIDGE_SCRIPT: &str = include_str!("invoke.py");

type PendingResult = oneshot::Sender<Result<Value, RunnerError>>;

/// Runner backed by a persistent Python interpreter.
///
/// Results are attributed to calls by order, not by request id, so `run`
/// calls on one instance are serialized internally.
pub struct PythonRunner {
    child: Child,
    stdin: Mutex<ChildStdin>,
    pending: Arc<Mutex<Option<PendingResult>>>,
    call_lock: Mutex<()>,
    config: FunctionConfig,
}

impl PythonRunner {
    /// Spawn the interpreter for this function. Must be called from within
    /// a tokio runtime; the stdout/stderr pumps live on it.
    pub fn spawn(config: FunctionConfig) -> Result<Self, RunnerError> {
        Self::spawn_with_sink(config, Arc::new(TracingSink))
    }

    pub fn spawn_with_sink(
        config: FunctionConfig,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, RunnerError> {
        let interpreter = config.runtime.interpreter(cfg!(windows));

        let base: HashMap<String, String> = std::env::vars().collect();
        let virtual_env = std::env::var_os("VIRTUAL_ENV").map(PathBuf::from);
        let env = child_env(
            &base,
            &config.environment,
            virtual_env.as_deref(),
            cfg!(windows),
        );

        let handler_path = relative_to_cwd(&config.handler_path);

        let mut child = Command::new(interpreter)
            .arg("-u")
            .arg("-c")
            .arg(BRIDGE_SCRIPT)
            .arg(&handler_path)
            .arg(config.handler_name())
            .env_clear()
            .envs(&env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(RunnerError::Spawn)?;

        let stdin = take_stdio(child.stdin.take(), "stdin")?;
        let stdout = take_stdio(child.stdout.take(), "stdout")?;
        let stderr = take_stdio(child.stderr.take(), "stderr")?;

        let pending: Arc<Mutex<Option<PendingResult>>> = Arc::new(Mutex::new(None));

        tokio::spawn(pump_stdout(stdout, pending.clone(), sink.clone()));
        tokio::spawn(pump_stderr(stderr, sink));

        debug!(
            function = %config.function_name,
            interpreter,
            handler_path = %handler_path.display(),
            "Spawned Python handler process"
        );

        Ok(Self {
            child,
            stdin: Mutex::new(stdin),
            pending,
            call_lock: Mutex::new(()),
            config,
        })
    }

    async fn write_request(&self, line: &str) -> std::io::Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await
    }
}

#[async_trait]
impl Runner for PythonRunner {
    async fn run(&self, event: Value, context: Value) -> Result<Value, RunnerError> {
        let _guard = self.call_lock.lock().await;

        let input = serde_json::to_string(&json!({
            "allowCache": self.config.allow_cache,
            "context": context,
            "event": event,
        }))?;

        // Register before writing so no output line can slip past the call.
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().await = Some(tx);

        if let Err(err) = self.write_request(&input).await {
            self.pending.lock().await.take();
            return Err(err.into());
        }

        let settled = match self.config.invocation_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(settled) => settled,
                Err(_) => {
                    // Drop the registration so a late result is not
                    // misattributed to the next call.
                    self.pending.lock().await.take();
                    return Err(RunnerError::Timeout(limit));
                }
            },
            None => rx.await,
        };

        settled.map_err(|_| RunnerError::ProcessExited)?
    }

    fn cleanup(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Consume the child's stdout, classifying each line. A payload line
/// settles the pending call; everything else is diagnostic.
async fn pump_stdout(
    stdout: ChildStdout,
    pending: Arc<Mutex<Option<PendingResult>>>,
    sink: Arc<dyn LogSink>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match classify_line(&line) {
                FramedLine::Payload(value) => {
                    if let Some(tx) = pending.lock().await.take() {
                        let _ = tx.send(Ok(value));
                    } else {
                        // Late result for a call that already settled
                        // (e.g. timed out); surface it instead of holding
                        // it for the next call.
                        sink.notice(&line);
                    }
                }
                FramedLine::Text | FramedLine::Json(_) => sink.notice(&line),
            },
            Ok(None) => {
                // Stream ended under a pending call: the process is gone
                // and no result can ever arrive.
                if let Some(tx) = pending.lock().await.take() {
                    let _ = tx.send(Err(RunnerError::ProcessExited));
                }
                break;
            }
            Err(err) => {
                if let Some(tx) = pending.lock().await.take() {
                    let _ = tx.send(Err(RunnerError::Io(err)));
                }
                break;
            }
        }
    }
}

/// Forward stderr to the sink. Warnings on stderr do not fail a call; the
/// process may still produce a valid result afterward.
async fn pump_stderr(stderr: ChildStderr, sink: Arc<dyn LogSink>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        sink.notice(&line);
    }
}

/// Build the child process environment.
///
/// The returned map is handed to the spawn as the child's own environment;
/// the host's process-wide environment is never mutated. When a
/// virtual-environment root is present its executable directory is
/// prepended to `PATH` so the isolated interpreter wins over any
/// system-wide one.
pub(crate) fn child_env(
    base: &HashMap<String, String>,
    overrides: &HashMap<String, String>,
    virtual_env: Option<&Path>,
    windows: bool,
) -> HashMap<String, String> {
    let mut env = base.clone();

    if let Some(root) = virtual_env {
        let bin = root.join(if windows { "Scripts" } else { "bin" });
        let separator = if windows { ';' } else { ':' };
        let path = env.get("PATH").cloned().unwrap_or_default();
        env.insert(
            "PATH".to_string(),
            format!("{}{}{}", bin.display(), separator, path),
        );
    }

    env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

fn relative_to_cwd(path: &Path) -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(&cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
}

fn take_stdio<T>(stdio: Option<T>, name: &str) -> Result<T, RunnerError> {
    stdio.ok_or_else(|| {
        RunnerError::Spawn(std::io::Error::other(format!(
            "child {name} was not captured"
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> HashMap<String, String> {
        HashMap::from([
            ("PATH".to_string(), "/usr/bin:/bin".to_string()),
            ("HOME".to_string(), "/home/dev".to_string()),
        ])
    }

    #[test]
    fn test_child_env_without_venv() {
        let env = child_env(&base_env(), &HashMap::new(), None, false);
        assert_eq!(env.get("PATH").map(String::as_str), Some("/usr/bin:/bin"));
        assert_eq!(env.get("HOME").map(String::as_str), Some("/home/dev"));
    }

    #[test]
    fn test_child_env_prepends_venv_bin() {
        let env = child_env(
            &base_env(),
            &HashMap::new(),
            Some(Path::new("/home/dev/.venv")),
            false,
        );
        assert_eq!(
            env.get("PATH").map(String::as_str),
            Some("/home/dev/.venv/bin:/usr/bin:/bin")
        );
    }

    #[test]
    fn test_child_env_venv_on_windows() {
        let base = HashMap::from([("PATH".to_string(), "/base".to_string())]);
        let env = child_env(&base, &HashMap::new(), Some(Path::new("/venv")), true);

        let expected = format!("{};/base", Path::new("/venv").join("Scripts").display());
        assert_eq!(env.get("PATH"), Some(&expected));
    }

    #[test]
    fn test_child_env_overrides_win_and_base_is_untouched() {
        let base = base_env();
        let overrides = HashMap::from([
            ("HOME".to_string(), "/tmp/sandbox".to_string()),
            ("STAGE".to_string(), "dev".to_string()),
        ]);

        let env = child_env(&base, &overrides, None, false);
        assert_eq!(env.get("HOME").map(String::as_str), Some("/tmp/sandbox"));
        assert_eq!(env.get("STAGE").map(String::as_str), Some("dev"));
        assert_eq!(base.get("HOME").map(String::as_str), Some("/home/dev"));
        assert!(!base.contains_key("STAGE"));
    }
}
