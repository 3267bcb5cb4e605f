pub mod logging_config;
pub mod paths;
pub mod scripting_config;
pub mod server_config;
pub mod tellus_config;

pub use logging_config::LoggingConfig;
pub use paths::ProjectPaths;
pub use scripting_config::ScriptingConfig;
pub use server_config::ServerConfig;
pub use tellus_config::{ConfigLoadError, TellusConfig};
