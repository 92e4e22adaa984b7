//! Java backend
//!
//! Nothing persists between calls. Each invocation first tries a
//! `java-invoke-local` server already running on a well-known local port,
//! and falls back to a one-shot invocation of the same tool when the
//! server is not reachable. Only a fallback failure fails the call.

use crate::framing::extract_result;
use crate::function::FunctionConfig;
use crate::runner::{Runner, RunnerError};
use crate::sink::{LogSink, TracingSink};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Environment variable overriding the local invocation server port.
pub const SERVER_PORT_VAR: &str = "JAVA_OFFLINE_SERVER";

/// Well-known port of `java-invoke-local --server`.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// One-shot local invocation command used when the server is down.
const FALLBACK_COMMAND: &str = "java-invoke-local";

const SERVER_DOWN_NOTICE: &str = "Local java server not running. For faster local invocations, run \"java-invoke-local --server\" in your project directory";

/// Runner invoking Java handlers through the local invocation tooling.
pub struct JavaRunner {
    config: FunctionConfig,
    client: reqwest::Client,
    server_port: u16,
    fallback_command: String,
    sink: Arc<dyn LogSink>,
}

impl JavaRunner {
    pub fn new(config: FunctionConfig) -> Self {
        let server_port = std::env::var(SERVER_PORT_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_SERVER_PORT);

        Self {
            config,
            client: reqwest::Client::new(),
            server_port,
            fallback_command: FALLBACK_COMMAND.to_string(),
            sink: Arc::new(TracingSink),
        }
    }

    #[must_use]
    pub fn with_server_port(mut self, port: u16) -> Self {
        self.server_port = port;
        self
    }

    #[must_use]
    pub fn with_fallback_command(mut self, command: impl Into<String>) -> Self {
        self.fallback_command = command.into();
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    fn artifact(&self) -> String {
        self.config
            .artifact
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_default()
    }

    async fn invoke_server(&self, input: &str) -> Result<String, reqwest::Error> {
        let body = json!({
            "artifact": self.artifact(),
            "data": input,
            "function": self.config.function_name,
            "handler": self.config.handler,
            "jsonOutput": true,
            "serverlessOffline": true,
        });

        self.client
            .post(format!("http://localhost:{}/invoke", self.server_port))
            .json(&body)
            .send()
            .await?
            .text()
            .await
    }

    async fn invoke_fallback(&self, input: &str) -> Result<String, RunnerError> {
        let artifact = self.artifact();

        let output = Command::new(&self.fallback_command)
            .args([
                "-c",
                &self.config.handler,
                "-a",
                &artifact,
                "-f",
                &self.config.function_name,
                "-d",
                input,
                "--json-output",
                "--serverless-offline",
            ])
            .envs(&self.config.environment)
            .output()
            .await
            .map_err(RunnerError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RunnerError::FallbackInvocation(format!(
                "{} exited with {}: {}",
                self.fallback_command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn run_inner(&self, event: Value, context: Value) -> Result<Value, RunnerError> {
        let input = serde_json::to_string(&json!({
            "context": context,
            "event": event,
        }))?;

        let raw = match self.invoke_server(&input).await {
            Ok(text) => text,
            Err(err) => {
                debug!(
                    function = %self.config.function_name,
                    error = %err,
                    "Local invocation server unreachable, using one-shot fallback"
                );
                self.sink.notice(SERVER_DOWN_NOTICE);

                let text = self.invoke_fallback(&input).await?;
                self.sink.notice(&text);
                text
            }
        };

        // Diagnostic lines were already surfaced above; only the result
        // matters here.
        let (payload, _diagnostics) = extract_result(&raw);
        Ok(payload.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Runner for JavaRunner {
    async fn run(&self, event: Value, context: Value) -> Result<Value, RunnerError> {
        match self.config.invocation_timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_inner(event, context))
                .await
                .map_err(|_| RunnerError::Timeout(limit))?,
            None => self.run_inner(event, context).await,
        }
    }

    // No persistent resource to release.
    fn cleanup(&mut self) {}
}
