//! Bounded counters attached to a player.
//!
//! A gauge moves between three levels: empty, somewhere in between, and
//! full. A gauge whose ceiling is 0 is pinned at both ends at once. The
//! on-full and on-empty scripts fire on *entry* into the corresponding level,
//! so holding a gauge at its ceiling fires once no matter how many times the
//! value is written.
//!
//! Gauges only exist inside their owning [`Player`](crate::Player); this
//! module holds the pure state machine and reports which edges a mutation
//! crossed. Executing the edge scripts is the owner's job, after it has
//! released its own lock.

use crate::aspect::Aspect;
use crate::protocol::Outbound;
use crate::script::Script;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeLevel {
    Empty,
    Between,
    Full,
    /// `max == 0`: empty and full at the same time.
    Pinned,
}

impl GaugeLevel {
    fn of(val: u32, max: u32) -> Self {
        if max == 0 {
            GaugeLevel::Pinned
        } else if val == 0 {
            GaugeLevel::Empty
        } else if val == max {
            GaugeLevel::Full
        } else {
            GaugeLevel::Between
        }
    }

    pub fn is_full(self) -> bool {
        matches!(self, GaugeLevel::Full | GaugeLevel::Pinned)
    }

    pub fn is_empty(self) -> bool {
        matches!(self, GaugeLevel::Empty | GaugeLevel::Pinned)
    }
}

/// Level boundaries crossed by a single mutation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Edges {
    pub filled: bool,
    pub emptied: bool,
}

impl Edges {
    fn between(before: GaugeLevel, after: GaugeLevel) -> Self {
        Self {
            filled: after.is_full() && !before.is_full(),
            emptied: after.is_empty() && !before.is_empty(),
        }
    }

    pub fn any(self) -> bool {
        self.filled || self.emptied
    }
}

/// Everything needed to create a gauge.
#[derive(Debug, Clone)]
pub struct GaugeSpec {
    pub name: String,
    pub val: i64,
    pub max: u32,
    pub aspect_full: Aspect,
    pub aspect_empty: Aspect,
    pub visible: bool,
}

impl GaugeSpec {
    pub fn new(name: impl Into<String>, val: i64, max: u32) -> Self {
        Self {
            name: name.into(),
            val,
            max,
            aspect_full: Aspect::default(),
            aspect_empty: Aspect::default(),
            visible: true,
        }
    }

    pub fn with_aspects(mut self, full: Aspect, empty: Aspect) -> Self {
        self.aspect_full = full;
        self.aspect_empty = empty;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Gauge {
    name: String,
    val: u32,
    max: u32,
    level: GaugeLevel,
    on_full: Option<Script>,
    on_empty: Option<Script>,
    aspect_full: Aspect,
    aspect_empty: Aspect,
    visible: bool,
}

impl Gauge {
    /// Only the owning player builds gauges, see `Player::new_gauge`.
    pub(crate) fn new(spec: GaugeSpec) -> Self {
        let val = clamp(spec.val, spec.max);
        Self {
            name: spec.name,
            val,
            max: spec.max,
            level: GaugeLevel::of(val, spec.max),
            on_full: None,
            on_empty: None,
            aspect_full: spec.aspect_full,
            aspect_empty: spec.aspect_empty,
            visible: spec.visible,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn val(&self) -> u32 {
        self.val
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn level(&self) -> GaugeLevel {
        self.level
    }

    pub fn set_val(&mut self, val: i64) -> Edges {
        self.val = clamp(val, self.max);
        self.settle()
    }

    pub fn increase(&mut self, by: i64) -> Edges {
        self.set_val(i64::from(self.val).saturating_add(by))
    }

    pub fn decrease(&mut self, by: i64) -> Edges {
        self.set_val(i64::from(self.val).saturating_sub(by))
    }

    /// Change the ceiling, pulling the value down with it when needed.
    pub fn set_max(&mut self, max: u32) -> Edges {
        self.max = max;
        self.val = self.val.min(max);
        self.settle()
    }

    fn settle(&mut self) -> Edges {
        let level = GaugeLevel::of(self.val, self.max);
        let edges = Edges::between(self.level, level);
        self.level = level;
        edges
    }

    pub fn on_full(&self) -> Option<&Script> {
        self.on_full.as_ref()
    }

    pub fn set_on_full(&mut self, script: Option<Script>) {
        self.on_full = script;
    }

    pub fn on_empty(&self) -> Option<&Script> {
        self.on_empty.as_ref()
    }

    pub fn set_on_empty(&mut self, script: Option<Script>) {
        self.on_empty = script;
    }

    /// Scripts to run for the given edges, on-full first.
    pub(crate) fn edge_scripts(&self, edges: Edges) -> Vec<Script> {
        let mut scripts = Vec::new();
        if edges.filled {
            scripts.extend(self.on_full.clone());
        }
        if edges.emptied {
            scripts.extend(self.on_empty.clone());
        }
        scripts
    }

    pub fn aspect_full(&self) -> &Aspect {
        &self.aspect_full
    }

    pub fn aspect_empty(&self) -> &Aspect {
        &self.aspect_empty
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn update_message(&self) -> Outbound {
        Outbound::Gauge {
            name: self.name.clone(),
            val: self.val,
            max: self.max,
            full: self.aspect_full.clone(),
            empty: self.aspect_empty.clone(),
        }
    }
}

fn clamp(val: i64, max: u32) -> u32 {
    // The clamp keeps the value inside u32 range.
    val.clamp(0, i64::from(max)) as u32
}
