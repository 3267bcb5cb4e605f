use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

/// Opaque material/category tag shared by places, players and gauges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Aspect(Arc<str>);

impl Aspect {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Aspect {
    fn default() -> Self {
        Self::new("none")
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Aspect {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Aspect {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AspectEntry {
    code: i64,
    passable: bool,
}

/// Registered aspects: the numeric code clients render them with and whether
/// a place of that aspect is passable by default.
#[derive(Debug, Default)]
pub struct AspectTable {
    entries: DashMap<Aspect, AspectEntry>,
}

impl AspectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) an aspect. Passability defaults to true.
    pub fn register(&self, aspect: Aspect, code: i64, passable: Option<bool>) {
        let entry = AspectEntry {
            code,
            passable: passable.unwrap_or(true),
        };
        if self.entries.insert(aspect.clone(), entry).is_some() {
            debug!(target: "server", "Aspect '{}' re-registered", aspect);
        }
    }

    /// Numeric code of a registered aspect, 0 when unknown.
    pub fn code(&self, aspect: &Aspect) -> i64 {
        self.entries.get(aspect).map(|e| e.code).unwrap_or(0)
    }

    /// Default passability of an aspect. Unregistered aspects are passable.
    pub fn default_passable(&self, aspect: &Aspect) -> bool {
        self.entries.get(aspect).map(|e| e.passable).unwrap_or(true)
    }

    pub fn is_registered(&self, aspect: &Aspect) -> bool {
        self.entries.contains_key(aspect)
    }
}
