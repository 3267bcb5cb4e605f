use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::DEFAULT_MAX_LINE_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on at startup. Without one the server only listens once
    /// a script calls `open`.
    pub port: Option<u16>,

    /// Length of one timer tick in milliseconds (default: 1000)
    pub tick_interval_ms: u64,

    /// Longest accepted client line in bytes; longer lines drop the connection
    pub max_line_len: usize,

    /// Largest zone scripts may create, in places (width * height)
    pub max_zone_cells: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: None,
            tick_interval_ms: 1000,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            max_zone_cells: 1 << 20,
        }
    }
}

impl ServerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}
