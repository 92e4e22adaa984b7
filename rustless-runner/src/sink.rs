//! Diagnostic output sinks

use tracing::info;

/// Capability used to surface diagnostic output from foreign handlers.
///
/// Everything a handler prints that is not the invocation result is
/// forwarded here. The gateway may inject its own sink; the default writes
/// through `tracing`.
pub trait LogSink: Send + Sync {
    /// Surface one line of diagnostic output.
    fn notice(&self, line: &str);
}

/// Default sink writing through the host's tracing subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn notice(&self, line: &str) {
        info!(target: "rustless::handler", "{}", line);
    }
}
