//! Multiplayer grid-world engine.
//!
//! A [`Server`] accepts line-oriented TCP clients, turns each into a
//! [`Player`] standing in a [`Zone`], and lets an embedded [`ScriptEngine`]
//! define everything that happens: client commands are bound to scripts,
//! timers fire scripts, gauges fire scripts when they fill up or run dry.

pub mod aspect;
pub mod boundary;
pub mod config;
pub mod connection;
pub mod error;
pub mod gauge;
pub mod ids;
pub mod inventory;
pub mod player;
pub mod protocol;
mod registry;
pub mod script;
pub mod server;
pub mod tags;
pub mod timer;
pub mod zone;

pub use aspect::{Aspect, AspectTable};
pub use boundary::Boundary;
pub use config::TellusConfig;
pub use error::{BuildError, StartupError};
pub use gauge::{Gauge, GaugeLevel, GaugeSpec};
pub use ids::{ArtifactId, InventoryId, PlayerId, TimerId, ZoneId};
pub use inventory::{Artifact, Inventory};
pub use player::{Player, PlayerView};
pub use protocol::Outbound;
pub use script::{Script, ScriptEngine, ScriptError};
pub use server::{Server, ServerBuilder, WeakServer};
pub use tags::Tags;
pub use zone::{Place, Tile, Zone};
