//! The seam between the world and whatever language runs its scripts.
//!
//! The world never interprets script text itself. Every script it stores
//! (action bindings, timers, gauge edges, on-walk and on-death hooks) is an
//! opaque [`Script`] handed back to a [`ScriptEngine`] for execution.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ids::PlayerId;

/// Script source text.
///
/// Two scripts are the same script when their text is identical. The absence
/// of a script is expressed with `Option<Script>`, never with an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Script(Arc<str>);

impl Script {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self(source.into())
    }

    pub fn source(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Script {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for Script {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("script failed to compile: {0}")]
    Compile(String),
    #[error("script failed: {0}")]
    Runtime(String),
    #[error("script panicked: {0}")]
    Panicked(String),
    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A scripting runtime the world can call into.
///
/// Both calls are synchronous and must be re-entrant: a script may call back
/// into any world operation, which may in turn execute further scripts on the
/// same thread before the outer call returns.
pub trait ScriptEngine: Send + Sync + 'static {
    /// Run `script` with an optional player context and argument.
    fn execute(
        &self,
        script: &Script,
        player: Option<PlayerId>,
        arg: Option<&str>,
    ) -> Result<(), ScriptError>;

    /// Run the spawn entry point for a freshly accepted player. The entry point
    /// is expected to place the player into a zone.
    fn spawn(&self, player: PlayerId) -> Result<(), ScriptError>;

    /// Run a script file without player context.
    fn run_file(&self, path: &Path) -> Result<(), ScriptError> {
        let source = read_script(path)?;
        self.execute(&source, None, None)
    }
}

/// Load a script file.
pub fn read_script(path: &Path) -> Result<Script, ScriptError> {
    std::fs::read_to_string(path)
        .map(Script::from)
        .map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_by_text() {
        assert_eq!(Script::from("say hi"), Script::from(String::from("say hi")));
        assert_ne!(Script::from("say hi"), Script::from("say bye"));
    }
}
