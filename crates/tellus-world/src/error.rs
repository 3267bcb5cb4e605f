use std::io;

/// Failure to start listening for connections.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Unable to create socket: {0}")]
    Socket(#[source] io::Error),
    #[error("Unable to set socket option SO_REUSEADDR: {0}")]
    SocketOption(#[source] io::Error),
    #[error("Unable to bind socket to port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("Unable to listen on socket: {0}")]
    Listen(#[source] io::Error),
}

/// Error during builder configuration
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Script engine not specified - use .with_engine()")]
    MissingEngine,
    #[error("No tokio runtime available - build inside a runtime or use .with_runtime()")]
    NoRuntime,
}
