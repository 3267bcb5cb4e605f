use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to `tellus.log` in the log directory
    pub file: bool,

    /// `tracing_subscriber::EnvFilter` directives, e.g. `"info,scripting=debug"`.
    /// `RUST_LOG` takes precedence.
    pub filter: Option<String>,
}
