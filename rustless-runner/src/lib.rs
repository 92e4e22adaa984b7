//! Foreign-runtime handler invocation for Rustless
//!
//! Bridges the host to function handlers implemented in other language
//! runtimes: Python handlers run in a persistent interpreter per function,
//! Java handlers go through a local invocation server with a one-shot
//! subprocess fallback.

pub mod framing;
pub mod function;
pub mod java;
pub mod python;
pub mod runner;
pub mod sink;

pub use function::{FunctionConfig, Runtime};
pub use java::JavaRunner;
pub use python::PythonRunner;
pub use runner::{runner_for, Runner, RunnerError};
pub use sink::{LogSink, TracingSink};
