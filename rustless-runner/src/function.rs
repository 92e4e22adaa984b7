//! Function configuration models

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Supported handler runtimes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Runtime {
    #[serde(rename = "python2.7")]
    Python27,
    #[serde(rename = "python3.6")]
    Python36,
    #[serde(rename = "python3.7")]
    Python37,
    #[serde(rename = "python3.8")]
    Python38,
    #[serde(rename = "python3.9")]
    Python39,
    #[serde(rename = "python3.10")]
    Python310,
    #[serde(rename = "python3.11")]
    Python311,
    #[serde(rename = "python3.12")]
    Python312,
    #[serde(rename = "java8")]
    Java8,
    #[serde(rename = "java8.al2")]
    Java8Al2,
    #[serde(rename = "java11")]
    Java11,
    #[serde(rename = "java17")]
    Java17,
    #[serde(rename = "java21")]
    Java21,
    #[serde(rename = "nodejs18.x")]
    Nodejs18,
    #[serde(rename = "nodejs20.x")]
    Nodejs20,
}

impl Runtime {
    /// Parse runtime string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "python2.7" => Some(Self::Python27),
            "python3.6" => Some(Self::Python36),
            "python3.7" => Some(Self::Python37),
            "python3.8" => Some(Self::Python38),
            "python3.9" => Some(Self::Python39),
            "python3.10" => Some(Self::Python310),
            "python3.11" => Some(Self::Python311),
            "python3.12" => Some(Self::Python312),
            "java8" => Some(Self::Java8),
            "java8.al2" => Some(Self::Java8Al2),
            "java11" => Some(Self::Java11),
            "java17" => Some(Self::Java17),
            "java21" => Some(Self::Java21),
            "nodejs18.x" => Some(Self::Nodejs18),
            "nodejs20.x" => Some(Self::Nodejs20),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python27 => "python2.7",
            Self::Python36 => "python3.6",
            Self::Python37 => "python3.7",
            Self::Python38 => "python3.8",
            Self::Python39 => "python3.9",
            Self::Python310 => "python3.10",
            Self::Python311 => "python3.11",
            Self::Python312 => "python3.12",
            Self::Java8 => "java8",
            Self::Java8Al2 => "java8.al2",
            Self::Java11 => "java11",
            Self::Java17 => "java17",
            Self::Java21 => "java21",
            Self::Nodejs18 => "nodejs18.x",
            Self::Nodejs20 => "nodejs20.x",
        }
    }

    pub fn is_python(&self) -> bool {
        matches!(
            self,
            Self::Python27
                | Self::Python36
                | Self::Python37
                | Self::Python38
                | Self::Python39
                | Self::Python310
                | Self::Python311
                | Self::Python312
        )
    }

    pub fn is_java(&self) -> bool {
        matches!(
            self,
            Self::Java8 | Self::Java8Al2 | Self::Java11 | Self::Java17 | Self::Java21
        )
    }

    /// Interpreter executable for a Python runtime.
    ///
    /// The identifier up to its first `.` names the executable on unix
    /// (`python3.9` resolves to `python3`); Windows installs expose a plain
    /// `python` binary regardless of minor version.
    pub fn interpreter(&self, windows: bool) -> &'static str {
        if windows {
            return "python";
        }
        match self {
            Self::Python27 => "python2",
            _ => "python3",
        }
    }
}

/// Static description of one deployable function.
#[derive(Debug, Clone)]
pub struct FunctionConfig {
    pub function_name: String,
    /// Handler reference, e.g. `handler.hello` or `com.example.Handler`.
    pub handler: String,
    /// Source file backing the handler (Python runtimes).
    pub handler_path: PathBuf,
    /// Deploy artifact (jar/zip) backing the handler (Java runtimes).
    pub artifact: Option<PathBuf>,
    pub runtime: Runtime,
    /// Extra environment for the foreign process, merged over the host's.
    pub environment: HashMap<String, String>,
    /// Whether the bridging process may keep the loaded handler module.
    pub allow_cache: bool,
    /// Upper bound on one invocation; `None` waits indefinitely.
    pub invocation_timeout: Option<Duration>,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            function_name: String::new(),
            handler: "handler.handler".to_string(),
            handler_path: PathBuf::from("handler.py"),
            artifact: None,
            runtime: Runtime::Python312,
            environment: HashMap::new(),
            allow_cache: false,
            invocation_timeout: None,
        }
    }
}

impl FunctionConfig {
    /// Exported name of the handler within its module: the final segment of
    /// the handler reference.
    pub fn handler_name(&self) -> &str {
        self.handler.rsplit('.').next().unwrap_or(&self.handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_round_trip() {
        for runtime in [
            Runtime::Python27,
            Runtime::Python312,
            Runtime::Java8Al2,
            Runtime::Java21,
            Runtime::Nodejs20,
        ] {
            assert_eq!(Runtime::from_str(runtime.as_str()), Some(runtime));
        }
        assert_eq!(Runtime::from_str("ruby3.2"), None);
    }

    #[test]
    fn test_runtime_families() {
        assert!(Runtime::Python39.is_python());
        assert!(!Runtime::Python39.is_java());
        assert!(Runtime::Java17.is_java());
        assert!(!Runtime::Nodejs18.is_python());
        assert!(!Runtime::Nodejs18.is_java());
    }

    #[test]
    fn test_interpreter_resolution() {
        assert_eq!(Runtime::Python39.interpreter(false), "python3");
        assert_eq!(Runtime::Python27.interpreter(false), "python2");
        assert_eq!(Runtime::Python311.interpreter(true), "python");
    }

    #[test]
    fn test_handler_name() {
        let config = FunctionConfig {
            handler: "src/handlers/orders.process".to_string(),
            ..Default::default()
        };
        assert_eq!(config.handler_name(), "process");

        let bare = FunctionConfig {
            handler: "main".to_string(),
            ..Default::default()
        };
        assert_eq!(bare.handler_name(), "main");
    }
}
