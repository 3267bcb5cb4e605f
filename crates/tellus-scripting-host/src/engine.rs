use std::cell::Cell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use rhai::{Dynamic, Engine, Scope, AST, INT};
use tracing::{debug, info, warn};

use tellus_world::config::ScriptingConfig;
use tellus_world::script::read_script;
use tellus_world::{Boundary, PlayerId, Script, ScriptEngine, ScriptError, WeakServer};

use crate::bindings;

/// Compiled scripts, keyed by their text.
type AstCache = HashMap<Script, AST>;

thread_local! {
    /// Executions currently running on this thread.
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Counts one running execution for as long as it lives.
struct Nested;

impl Nested {
    fn enter(limit: usize) -> Option<Nested> {
        DEPTH.with(|depth| {
            if depth.get() >= limit {
                return None;
            }
            depth.set(depth.get() + 1);
            Some(Nested)
        })
    }
}

impl Drop for Nested {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// [`ScriptEngine`] running scripts as Rhai.
///
/// Every execution gets a fresh scope holding two constants: `player` (the
/// id of the player the script runs for, or `()`) and `arg` (the command
/// argument, or `()`). Compiled scripts are cached by their text; the cache
/// lock is never held while a script runs, so scripts can trigger further
/// scripts, up to `max_nesting` deep.
pub struct RhaiEngine {
    engine: Engine,
    cache: Mutex<AstCache>,
    max_cached: usize,
    max_nesting: usize,
    spawn_script: PathBuf,
}

impl RhaiEngine {
    pub fn new(server: WeakServer, config: &ScriptingConfig) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(config.max_operations);
        engine.set_max_call_levels(config.max_call_levels);
        engine.on_print(|text| info!(target: "script", "{}", text));
        engine.on_debug(|text, source, pos| {
            debug!(target: "script", "{} @ {:?} {}", text, source, pos)
        });

        bindings::register(&mut engine, Boundary::new(server));

        Self {
            engine,
            cache: Mutex::new(HashMap::new()),
            max_cached: config.max_cached_scripts.max(1),
            max_nesting: config.max_nesting,
            spawn_script: config.spawn_script_path(),
        }
    }

    fn compile(&self, script: &Script) -> Result<AST, ScriptError> {
        if let Some(ast) = self.cache().get(script) {
            return Ok(ast.clone());
        }
        let ast = self
            .engine
            .compile(script.source())
            .map_err(|e| ScriptError::Compile(e.to_string()))?;
        let mut cache = self.cache();
        if cache.len() >= self.max_cached {
            debug!(target: "scripting", "Flushing {} compiled scripts", cache.len());
            cache.clear();
        }
        cache.insert(script.clone(), ast.clone());
        Ok(ast)
    }

    /// Number of compiled scripts currently cached.
    pub fn cached_scripts(&self) -> usize {
        self.cache().len()
    }

    fn cache(&self) -> MutexGuard<'_, AstCache> {
        self.cache.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl ScriptEngine for RhaiEngine {
    fn execute(
        &self,
        script: &Script,
        player: Option<PlayerId>,
        arg: Option<&str>,
    ) -> Result<(), ScriptError> {
        let Some(_nested) = Nested::enter(self.max_nesting) else {
            warn!(target: "scripting", "Scripts nested deeper than {}, not running another", self.max_nesting);
            return Err(ScriptError::Runtime(format!(
                "scripts nested deeper than {}",
                self.max_nesting
            )));
        };
        let ast = self.compile(script)?;

        let mut scope = Scope::new();
        let player = player
            .and_then(|id| INT::try_from(id.get()).ok())
            .map(Dynamic::from)
            .unwrap_or(Dynamic::UNIT);
        scope.push_constant_dynamic("player", player);
        let arg = arg
            .map(|a| Dynamic::from(a.to_string()))
            .unwrap_or(Dynamic::UNIT);
        scope.push_constant_dynamic("arg", arg);

        self.engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| ScriptError::Runtime(e.to_string()))
    }

    fn spawn(&self, player: PlayerId) -> Result<(), ScriptError> {
        let script = read_script(&self.spawn_script)?;
        self.execute(&script, Some(player), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RhaiEngine {
        RhaiEngine::new(WeakServer::default(), &ScriptingConfig::default())
    }

    #[test]
    fn test_scope_constants() {
        let e = engine();
        let check = Script::from(
            r#"
            if player != 7 { throw "player"; }
            if arg != "north" { throw "arg"; }
            "#,
        );
        e.execute(&check, Some(PlayerId(7)), Some("north")).unwrap();

        let unset = Script::from(r#"if player != () || arg != () { throw "not unit"; }"#);
        e.execute(&unset, None, None).unwrap();
    }

    #[test]
    fn test_scripts_are_compiled_once() {
        let e = engine();
        let s = Script::from("let x = 1 + 1;");
        e.execute(&s, None, None).unwrap();
        e.execute(&s, None, None).unwrap();
        assert_eq!(e.cached_scripts(), 1);
    }

    #[test]
    fn test_cache_is_bounded() {
        let e = RhaiEngine::new(
            WeakServer::default(),
            &ScriptingConfig {
                max_cached_scripts: 3,
                ..ScriptingConfig::default()
            },
        );
        for i in 0..10 {
            e.execute(&Script::from(format!("let x = {i};")), None, None).unwrap();
            assert!(e.cached_scripts() <= 3);
        }
        assert!(e.cached_scripts() >= 1);
    }

    #[test]
    fn test_nesting_is_limited_per_thread() {
        let e = RhaiEngine::new(
            WeakServer::default(),
            &ScriptingConfig {
                max_nesting: 2,
                ..ScriptingConfig::default()
            },
        );
        let s = Script::from("1;");
        let first = Nested::enter(2).unwrap();
        e.execute(&s, None, None).unwrap();
        let second = Nested::enter(2).unwrap();
        assert!(matches!(e.execute(&s, None, None), Err(ScriptError::Runtime(_))));
        drop(second);
        drop(first);
        e.execute(&s, None, None).unwrap();
    }

    #[test]
    fn test_errors_are_classified() {
        let e = engine();
        assert!(matches!(
            e.execute(&Script::from("let = ;"), None, None),
            Err(ScriptError::Compile(_))
        ));
        assert!(matches!(
            e.execute(&Script::from(r#"throw "boom";"#), None, None),
            Err(ScriptError::Runtime(_))
        ));
        assert_eq!(e.cached_scripts(), 1, "failed compiles are not cached");
    }

    #[test]
    fn test_constants_are_read_only() {
        let e = engine();
        assert!(e
            .execute(&Script::from("player = 3;"), Some(PlayerId(1)), None)
            .is_err());
    }

    #[test]
    fn test_runaway_scripts_are_stopped() {
        let e = RhaiEngine::new(
            WeakServer::default(),
            &ScriptingConfig {
                max_operations: 1_000,
                ..ScriptingConfig::default()
            },
        );
        assert!(matches!(
            e.execute(&Script::from("loop {}"), None, None),
            Err(ScriptError::Runtime(_))
        ));
    }

    #[test]
    fn test_missing_spawn_script() {
        let dir = tempfile::tempdir().unwrap();
        let e = RhaiEngine::new(
            WeakServer::default(),
            &ScriptingConfig {
                script_dir: Some(dir.path().to_path_buf()),
                ..ScriptingConfig::default()
            },
        );
        assert!(matches!(e.spawn(PlayerId(1)), Err(ScriptError::Io { .. })));
    }
}
