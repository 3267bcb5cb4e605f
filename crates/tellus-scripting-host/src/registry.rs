use std::sync::Arc;

use tracing::debug;

use tellus_world::config::ScriptingConfig;
use tellus_world::{ScriptEngine, WeakServer};

use crate::engine::RhaiEngine;

/// Engine factory for [`ServerBuilder::with_engine`](tellus_world::ServerBuilder::with_engine).
pub fn create_engine_from_config(
    config: &ScriptingConfig,
) -> impl FnOnce(WeakServer) -> Arc<dyn ScriptEngine> + Send + 'static {
    let config = config.clone();
    move |server| {
        debug!(target: "scripting", "Creating rhai engine, scripts in {}", config.script_dir().display());
        Arc::new(RhaiEngine::new(server, &config)) as Arc<dyn ScriptEngine>
    }
}
