#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};

use tellus_world::config::ServerConfig;
use tellus_world::{PlayerId, Script, ScriptEngine, ScriptError, Server, WeakServer};

type Handler = Arc<dyn Fn(&Server, Option<PlayerId>, Option<&str>) + Send + Sync>;
type SpawnHandler = Arc<dyn Fn(&Server, PlayerId) + Send + Sync>;

/// One recorded script execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub script: String,
    pub player: Option<PlayerId>,
    pub arg: Option<String>,
}

/// Script engine whose "scripts" are Rust closures keyed by script text.
/// Unknown scripts succeed without doing anything; the script `fail` errors.
pub struct TestEngine {
    server: WeakServer,
    handlers: Mutex<HashMap<String, Handler>>,
    spawn: Mutex<Option<SpawnHandler>>,
    calls: Mutex<Vec<Call>>,
}

impl TestEngine {
    fn new(server: WeakServer) -> Self {
        Self {
            server,
            handlers: Mutex::new(HashMap::new()),
            spawn: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on<F>(&self, script: &str, handler: F)
    where
        F: Fn(&Server, Option<PlayerId>, Option<&str>) + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .insert(script.to_string(), Arc::new(handler));
    }

    pub fn on_spawn<F>(&self, handler: F)
    where
        F: Fn(&Server, PlayerId) + Send + Sync + 'static,
    {
        *self.spawn.lock().unwrap() = Some(Arc::new(handler));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, script: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.script == script)
            .collect()
    }
}

impl ScriptEngine for TestEngine {
    fn execute(
        &self,
        script: &Script,
        player: Option<PlayerId>,
        arg: Option<&str>,
    ) -> Result<(), ScriptError> {
        self.calls.lock().unwrap().push(Call {
            script: script.source().to_string(),
            player,
            arg: arg.map(str::to_string),
        });
        if script.source() == "fail" {
            return Err(ScriptError::Runtime("asked to fail".to_string()));
        }
        let handler = self.handlers.lock().unwrap().get(script.source()).cloned();
        if let (Some(handler), Some(server)) = (handler, self.server.upgrade()) {
            handler(&server, player, arg);
        }
        Ok(())
    }

    fn spawn(&self, player: PlayerId) -> Result<(), ScriptError> {
        let handler = self.spawn.lock().unwrap().clone();
        if let (Some(handler), Some(server)) = (handler, self.server.upgrade()) {
            handler(&server, player);
        }
        Ok(())
    }
}

/// A server whose clock never ticks on its own; tests call `tick_timers`.
pub fn world() -> (Server, Arc<TestEngine>) {
    world_with(ServerConfig {
        tick_interval_ms: 3_600_000,
        ..ServerConfig::default()
    })
}

pub fn world_with(config: ServerConfig) -> (Server, Arc<TestEngine>) {
    let slot: Arc<Mutex<Option<Arc<TestEngine>>>> = Arc::new(Mutex::new(None));
    let engine_slot = Arc::clone(&slot);
    let server = Server::builder()
        .with_config(config)
        .with_engine(move |weak| {
            let engine = Arc::new(TestEngine::new(weak));
            *engine_slot.lock().unwrap() = Some(Arc::clone(&engine));
            engine
        })
        .build()
        .unwrap();
    let engine = slot.lock().unwrap().take().unwrap();
    (server, engine)
}

/// Spawn handler dropping every newcomer at `(x, y)` of `zone`.
pub fn spawn_into(engine: &TestEngine, zone: &'static str, x: u32, y: u32) {
    engine.on_spawn(move |server, id| {
        let zone = server.get_zone(zone).unwrap();
        let player = server.get_player(id).unwrap();
        assert!(player.spawn(&zone, x, y));
    });
}

/// The client end of an in-memory connection.
pub struct Client {
    pub id: Option<PlayerId>,
    lines: Lines<BufReader<DuplexStream>>,
    writer: DuplexStream,
}

impl Client {
    pub fn connect(server: &Server) -> Client {
        let (client_in, server_out) = tokio::io::duplex(64 * 1024);
        let (client_out, server_in) = tokio::io::duplex(64 * 1024);
        let id = server.admit(server_in, server_out, None);
        Client {
            id,
            lines: BufReader::new(client_in).lines(),
            writer: client_out,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id.expect("client was not admitted")
    }

    /// Next line, or `None` once the server closed the connection.
    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
    }

    pub async fn expect(&mut self, line: &str) {
        assert_eq!(self.recv().await.as_deref(), Some(line));
    }

    /// Skip lines until one starts with `prefix`.
    pub async fn recv_prefixed(&mut self, prefix: &str) -> String {
        loop {
            match self.recv().await {
                Some(line) if line.starts_with(prefix) => return line,
                Some(_) => continue,
                None => panic!("connection closed before a '{prefix}' line"),
            }
        }
    }

    pub async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    pub async fn expect_closed(&mut self) {
        loop {
            if self.recv().await.is_none() {
                return;
            }
        }
    }

    /// Every line that arrives before the connection goes quiet for `quiet`.
    pub async fn drain(&mut self, quiet: Duration) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(Ok(Some(line))) = tokio::time::timeout(quiet, self.lines.next_line()).await {
            lines.push(line);
        }
        lines
    }
}

/// Poll `cond` until it holds or a few seconds went by.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}

pub fn script(text: &str) -> Script {
    Script::from(text)
}
