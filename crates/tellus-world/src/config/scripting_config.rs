use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::ProjectPaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptingConfig {
    /// Directory containing scripts (default: the platform data dir + `/scripts`)
    pub script_dir: Option<PathBuf>,

    /// Run once at startup, relative to `script_dir`
    pub init_script: String,

    /// Run for every new connection, relative to `script_dir`
    pub spawn_script: String,

    /// Upper bound on operations per script execution (0 = unlimited)
    pub max_operations: u64,

    /// Upper bound on nested function calls
    pub max_call_levels: usize,

    /// How deeply scripts may trigger further scripts on one thread
    pub max_nesting: usize,

    /// Compiled scripts kept before the cache is flushed
    pub max_cached_scripts: usize,
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            script_dir: None,
            init_script: "init.rhai".to_string(),
            spawn_script: "spawn.rhai".to_string(),
            max_operations: 1_000_000,
            max_call_levels: 64,
            max_nesting: 10,
            max_cached_scripts: 1024,
        }
    }
}

impl ScriptingConfig {
    /// Get the script directory path (use provided or default)
    pub fn script_dir(&self) -> PathBuf {
        self.script_dir.clone().unwrap_or_else(|| {
            ProjectPaths::new("tellus")
                .map(|p| p.data_dir().join("scripts"))
                .unwrap_or_else(|| PathBuf::from("scripts"))
        })
    }

    pub fn init_script_path(&self) -> PathBuf {
        self.script_dir().join(&self.init_script)
    }

    pub fn spawn_script_path(&self) -> PathBuf {
        self.script_dir().join(&self.spawn_script)
    }
}
