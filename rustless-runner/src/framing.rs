//! Payload framing for foreign-runtime output
//!
//! Handlers running in a foreign process print freely to standard output.
//! The one line carrying the invocation result is wrapped in an object with
//! a sentinel key so it can be told apart from ordinary logging without
//! requiring the foreign side to keep its output stream disciplined.

use serde_json::Value;

/// Object key marking a line of child output as the invocation result.
pub const PAYLOAD_KEY: &str = "__offline_payload__";

/// Line separator of the host platform.
#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
/// Line separator of the host platform.
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

/// Classification of one line of child output.
#[derive(Debug, Clone, PartialEq)]
pub enum FramedLine {
    /// Not valid JSON; plain diagnostic text.
    Text,
    /// Valid JSON without the payload sentinel; still diagnostic.
    Json(Value),
    /// A sentinel-wrapped invocation result.
    Payload(Value),
}

/// Classify a single line of child output.
///
/// Total: a line that does not decode as JSON is [`FramedLine::Text`],
/// never an error.
pub fn classify_line(line: &str) -> FramedLine {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(mut map)) => match map.remove(PAYLOAD_KEY) {
            Some(payload) => FramedLine::Payload(payload),
            None => FramedLine::Json(Value::Object(map)),
        },
        Ok(other) => FramedLine::Json(other),
        Err(_) => FramedLine::Text,
    }
}

/// Split raw child output on the platform line separator and extract the
/// invocation result, if any.
///
/// At most one payload line is honored per call (the first); every other
/// line comes back as a diagnostic, in original order.
pub fn extract_result(text: &str) -> (Option<Value>, Vec<String>) {
    let mut payload = None;
    let mut diagnostics = Vec::new();

    for line in text.split(LINE_SEPARATOR) {
        if payload.is_none() {
            if let FramedLine::Payload(value) = classify_line(line) {
                payload = Some(value);
                continue;
            }
        }
        diagnostics.push(line.to_string());
    }

    (payload, diagnostics)
}
