//! Runner contract and backend selection

use crate::function::FunctionConfig;
use crate::java::JavaRunner;
use crate::python::PythonRunner;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Unsupported runtime: {0}")]
    UnsupportedRuntime(String),

    #[error("Failed to spawn runtime process: {0}")]
    Spawn(std::io::Error),

    #[error("Runtime process I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Runtime process exited before producing a result")]
    ProcessExited,

    #[error("Fallback invocation failed: {0}")]
    FallbackInvocation(String),

    #[error("Invocation timed out after {0:?}")]
    Timeout(Duration),
}

/// A backend able to invoke handlers for one foreign runtime.
///
/// `run` performs exactly one invocation: it resolves with the decoded
/// result or fails with a described error, never both. `cleanup` releases
/// whatever OS resource the backend holds; it is idempotent, never panics,
/// and is safe to call when nothing was ever allocated.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, event: Value, context: Value) -> Result<Value, RunnerError>;

    fn cleanup(&mut self);
}

/// Select the backend for a function at registration time.
///
/// Node handlers run in-process and never reach this layer; asking for one
/// here is a configuration error.
pub fn runner_for(config: FunctionConfig) -> Result<Box<dyn Runner>, RunnerError> {
    let runtime = config.runtime;
    if runtime.is_python() {
        Ok(Box::new(PythonRunner::spawn(config)?))
    } else if runtime.is_java() {
        Ok(Box::new(JavaRunner::new(config)))
    } else {
        Err(RunnerError::UnsupportedRuntime(runtime.as_str().to_string()))
    }
}
