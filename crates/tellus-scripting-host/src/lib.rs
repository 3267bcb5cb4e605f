//! Rhai scripting for the tellus server
//!
//! Provides the [`RhaiEngine`] the server runs its action, timer, gauge and
//! spawn scripts with, and registers the world's script-facing surface into it.
pub mod bindings;
pub mod engine;
pub mod registry;

pub use engine::RhaiEngine;
pub use registry::create_engine_from_config;
