//! The server: registries of everything in the world, the network listener
//! and the timer clock.
//!
//! [`Server`] is a cheap handle around shared state and can be cloned into
//! every task and script callback. Background tasks and entities hold a
//! [`WeakServer`] instead, so dropping the last handle tears the world down.

use std::any::Any;
use std::net::{Ipv4Addr, SocketAddr};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::aspect::{Aspect, AspectTable};
use crate::config::ServerConfig;
use crate::connection::{self, BoxedReader, LineReader};
use crate::error::{BuildError, StartupError};
use crate::ids::{ArtifactId, IdAllocator, InventoryId, PlayerId, TimerId, ZoneId};
use crate::inventory::{Artifact, Inventory};
use crate::player::Player;
use crate::registry::Registry;
use crate::script::{Script, ScriptEngine, ScriptError};
use crate::timer::{Reschedule, TimerPool};
use crate::zone::{Tile, Zone};

const MAX_SOCKET_QUEUE: u32 = 8;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

type EngineFactory = Box<dyn FnOnce(WeakServer) -> Arc<dyn ScriptEngine> + Send>;

struct Listener {
    port: u16,
    task: JoinHandle<()>,
}

pub(crate) struct ServerInner {
    config: ServerConfig,
    runtime: Handle,
    engine: Arc<dyn ScriptEngine>,

    zones: Registry<ZoneId, Zone>,
    players: Registry<PlayerId, Player>,
    actions: DashMap<String, Script>,
    timers: TimerPool,
    aspects: AspectTable,
    inventories: Registry<InventoryId, Mutex<Inventory>>,
    artifacts: Registry<ArtifactId, Mutex<Artifact>>,

    player_ids: IdAllocator,
    inventory_ids: IdAllocator,
    artifact_ids: IdAllocator,

    listener: Mutex<Option<Listener>>,
    timer_task: Mutex<Option<JoinHandle<()>>>,
    verbose: AtomicBool,
    terminated: Mutex<bool>,
    terminated_cv: Condvar,
}

impl Drop for ServerInner {
    fn drop(&mut self) {
        let listener = self.listener.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Some(listener) = listener.take() {
            listener.task.abort();
        }
        let timer_task = self.timer_task.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Some(task) = timer_task.take() {
            task.abort();
        }
    }
}

/// Handle to a running world.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

/// Non-owning handle to a [`Server`].
#[derive(Clone, Default)]
pub struct WeakServer(Weak<ServerInner>);

impl WeakServer {
    pub fn upgrade(&self) -> Option<Server> {
        self.0.upgrade().map(|inner| Server { inner })
    }
}

impl std::fmt::Debug for WeakServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WeakServer")
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("port", &self.port())
            .field("zones", &self.inner.zones.len())
            .field("players", &self.inner.players.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Server`]
pub struct ServerBuilder {
    config: ServerConfig,
    runtime: Option<Handle>,
    engine: Option<EngineFactory>,
}

impl ServerBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            runtime: None,
            engine: None,
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the script engine. The factory receives a handle to the server
    /// being built so the engine can call back into the world.
    pub fn with_engine<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(WeakServer) -> Arc<dyn ScriptEngine> + Send + 'static,
    {
        self.engine = Some(Box::new(factory));
        self
    }

    /// Run the server's tasks on `runtime` instead of the current one.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the server and start its timer clock.
    pub fn build(self) -> Result<Server, BuildError> {
        let factory = self.engine.ok_or(BuildError::MissingEngine)?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| BuildError::NoRuntime)?,
        };

        let inner = Arc::new_cyclic(|weak| ServerInner {
            engine: factory(WeakServer(weak.clone())),
            config: self.config,
            runtime,
            zones: Registry::new(),
            players: Registry::new(),
            actions: DashMap::new(),
            timers: TimerPool::new(),
            aspects: AspectTable::new(),
            inventories: Registry::new(),
            artifacts: Registry::new(),
            player_ids: IdAllocator::new(),
            inventory_ids: IdAllocator::new(),
            artifact_ids: IdAllocator::new(),
            listener: Mutex::new(None),
            timer_task: Mutex::new(None),
            verbose: AtomicBool::new(false),
            terminated: Mutex::new(false),
            terminated_cv: Condvar::new(),
        });

        let server = Server { inner };
        server.start_clock();
        Ok(server)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn downgrade(&self) -> WeakServer {
        WeakServer(Arc::downgrade(&self.inner))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    pub fn aspects(&self) -> &AspectTable {
        &self.inner.aspects
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.inner.verbose.store(verbose, Ordering::Relaxed);
    }

    pub fn is_verbose(&self) -> bool {
        self.inner.verbose.load(Ordering::Relaxed)
    }

    /* Network */

    /// Listen on `port` (0 picks a free one), replacing any previous
    /// listener. Returns the bound port.
    pub fn open(&self, port: u16) -> Result<u16, StartupError> {
        let mut listener = self.listener();
        if let Some(previous) = listener.take() {
            previous.task.abort();
            info!(target: "net", "Closed port {} to reopen", previous.port);
        }

        let _rt = self.inner.runtime.enter();
        let socket = TcpSocket::new_v4().map_err(StartupError::Socket)?;
        socket
            .set_reuseaddr(true)
            .map_err(StartupError::SocketOption)?;
        socket
            .bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            .map_err(|source| StartupError::Bind { port, source })?;
        let tcp = socket.listen(MAX_SOCKET_QUEUE).map_err(StartupError::Listen)?;
        let bound = tcp.local_addr().map(|a| a.port()).unwrap_or(port);

        let task = self.inner.runtime.spawn(accept_loop(self.downgrade(), tcp));
        *listener = Some(Listener { port: bound, task });
        info!(target: "net", "Server listening on port {}", bound);
        Ok(bound)
    }

    /// Stop accepting connections. Established connections stay up.
    pub fn close(&self) {
        if let Some(listener) = self.listener().take() {
            listener.task.abort();
            info!(target: "net", "Server closed port {}", listener.port);
        }
    }

    pub fn is_open(&self) -> bool {
        self.listener().is_some()
    }

    /// Bound port, 0 while closed.
    pub fn port(&self) -> u16 {
        self.listener().as_ref().map(|l| l.port).unwrap_or(0)
    }

    fn listener(&self) -> MutexGuard<'_, Option<Listener>> {
        self.inner.listener.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Turn a fresh connection into a player and run the spawn entry point
    /// for it. The player is dropped again, closing the connection, when the
    /// spawn entry point did not place it into a zone.
    pub fn admit<R, W>(&self, reader: R, writer: W, peer: Option<SocketAddr>) -> Option<PlayerId>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let id: PlayerId = self.inner.player_ids.next();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .runtime
            .spawn(connection::write_loop(writer, rx, id));

        let lines = LineReader::new(Box::new(reader) as BoxedReader)
            .max_line_len(self.inner.config.max_line_len);
        let player = Arc::new(Player::new(id, peer, self.downgrade(), tx, Some(lines)));
        self.add_player(Arc::clone(&player));

        if let Err(e) = self.run_engine(|engine| engine.spawn(id)) {
            warn!(target: "scripting", "Spawn script failed for player {}: {}", id, e);
        }

        if player.zone().is_none() {
            warn!(target: "server", "Player {} was not placed into a zone by the spawn script", id);
            self.del_player(id);
            return None;
        }
        Some(id)
    }

    /* Zones */

    /// Create and register a zone whose every place shows `base`.
    pub fn new_zone(
        &self,
        id: impl Into<ZoneId>,
        name: impl Into<String>,
        width: u32,
        height: u32,
        base: Aspect,
    ) -> Arc<Zone> {
        let passable = self.inner.aspects.default_passable(&base);
        let zone = Arc::new(Zone::new(
            self.downgrade(),
            id.into(),
            name.into(),
            width,
            height,
            Tile::new(base, passable),
        ));
        self.add_zone(Arc::clone(&zone));
        zone
    }

    /// Register a zone. A zone already registered under the same id is
    /// closed and its residents left zoneless.
    pub fn add_zone(&self, zone: Arc<Zone>) {
        if let Some(previous) = self.inner.zones.insert(zone.id().clone(), Arc::clone(&zone)) {
            if !Arc::ptr_eq(&previous, &zone) {
                info!(target: "server", "Zone '{}' replaced", previous.id());
                previous.evict_all();
            }
        }
    }

    pub fn get_zone(&self, id: &str) -> Option<Arc<Zone>> {
        self.inner.zones.get(id)
    }

    pub fn del_zone(&self, id: &str) -> bool {
        match self.inner.zones.remove(id) {
            Some(zone) => {
                zone.evict_all();
                true
            }
            None => {
                info!(target: "server", "Zone '{}' can't be deleted: doesn't exist", id);
                false
            }
        }
    }

    pub fn zone_ids(&self) -> Vec<ZoneId> {
        self.inner.zones.keys()
    }

    /* Players */

    /// Register a player. A different player already registered under the
    /// same id is destroyed.
    pub fn add_player(&self, player: Arc<Player>) {
        if let Some(previous) = self.inner.players.insert(player.id(), Arc::clone(&player)) {
            if !Arc::ptr_eq(&previous, &player) {
                warn!(target: "server", "Player {} replaced", previous.id());
                previous.destroy();
            }
        }
    }

    pub fn get_player(&self, id: PlayerId) -> Option<Arc<Player>> {
        self.inner.players.get(&id)
    }

    /// Unregister and destroy a player, closing its connection.
    pub fn del_player(&self, id: PlayerId) -> bool {
        match self.inner.players.remove(&id) {
            Some(player) => {
                player.destroy();
                true
            }
            None => {
                info!(target: "server", "Player {} can't be deleted: doesn't exist", id);
                false
            }
        }
    }

    /// Unregister a player without touching it.
    pub fn rem_player(&self, id: PlayerId) -> bool {
        self.inner.players.remove(&id).is_some()
    }

    /// Unregister `player`, unless its id has since been taken over by a
    /// different player.
    pub(crate) fn forget_player(&self, player: &Arc<Player>) -> bool {
        self.inner.players.remove_same(&player.id(), player)
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.inner.players.keys()
    }

    pub fn player_count(&self) -> usize {
        self.inner.players.len()
    }

    /* Actions */

    /// Bind `script` to the client command `trigger`.
    pub fn add_action(&self, trigger: impl Into<String>, script: Script) {
        let trigger = trigger.into();
        if self.inner.actions.insert(trigger.clone(), script).is_some() {
            debug!(target: "server", "Action '{}' rebound", trigger);
        }
    }

    pub fn get_action(&self, trigger: &str) -> Option<Script> {
        self.inner
            .actions
            .get(trigger)
            .map(|entry| entry.value().clone())
    }

    pub fn del_action(&self, trigger: &str) -> bool {
        if self.inner.actions.remove(trigger).is_none() {
            info!(target: "server", "Action '{}' can't be deleted: doesn't exist", trigger);
            return false;
        }
        true
    }

    /// Run the script bound to `trigger` for `player`. An empty argument is
    /// passed as no argument.
    pub fn do_action(&self, trigger: &str, player: PlayerId, arg: &str) -> bool {
        let Some(script) = self.get_action(trigger) else {
            info!(target: "server", "Action '{}' doesn't exist", trigger);
            return false;
        };
        if self.is_verbose() {
            debug!(target: "server", "Player {} does '{}' ({:?})", player, trigger, arg);
        }
        let arg = (!arg.is_empty()).then_some(arg);
        self.execute(&script, Some(player), arg);
        true
    }

    /* Timers */

    pub fn add_timer(&self, ticks: u32, script: Script) -> TimerId {
        self.inner.timers.add(ticks, script)
    }

    pub fn del_timer(&self, id: TimerId) -> bool {
        self.inner.timers.remove(id)
    }

    /// Ticks left before the timer fires, 0 when it doesn't exist.
    pub fn timer_remaining(&self, id: TimerId) -> u32 {
        self.inner.timers.remaining(id)
    }

    /// Rewrite a timer's counter. A zero counter fires it right away.
    pub fn set_timer_remaining(&self, id: TimerId, remaining: u32) -> bool {
        match self.inner.timers.set_remaining(id, remaining) {
            Reschedule::Rescheduled => true,
            Reschedule::Due(script) => {
                self.execute(&script, None, None);
                true
            }
            Reschedule::Missing => {
                warn!(target: "timers", "Cannot set remaining time of timer {}: not found", id);
                false
            }
        }
    }

    /// Fire a timer now and forget it.
    pub fn trigger_timer(&self, id: TimerId) -> bool {
        match self.inner.timers.take(id) {
            Some(script) => {
                self.execute(&script, None, None);
                true
            }
            None => {
                warn!(target: "timers", "Cannot trigger timer {}: not found", id);
                false
            }
        }
    }

    /// Advance every timer by one tick and run the ones that came due, in
    /// creation order. Returns how many fired.
    pub fn tick_timers(&self) -> usize {
        let fired = self.inner.timers.tick();
        for (id, script) in &fired {
            debug!(target: "timers", "Timer {} fired", id);
            self.execute(script, None, None);
        }
        fired.len()
    }

    pub fn timer_count(&self) -> usize {
        self.inner.timers.active_count()
    }

    fn start_clock(&self) {
        let weak = self.downgrade();
        let period = self.inner.config.tick_interval();
        let task = self.inner.runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(server) = weak.upgrade() else {
                    break;
                };
                server.tick_timers();
            }
        });
        *self.inner.timer_task.lock().unwrap_or_else(|p| p.into_inner()) = Some(task);
    }

    /* Inventories */

    pub fn new_inventory(&self, size: u32) -> InventoryId {
        let id = self.inner.inventory_ids.next();
        self.inner
            .inventories
            .insert(id, Arc::new(Mutex::new(Inventory::new(size))));
        id
    }

    pub fn del_inventory(&self, id: InventoryId) -> bool {
        self.inner.inventories.remove(&id).is_some()
    }

    pub fn has_inventory(&self, id: InventoryId) -> bool {
        self.inner.inventories.contains(&id)
    }

    /// Run `f` on an inventory. `None` when it doesn't exist.
    pub fn with_inventory<R>(&self, id: InventoryId, f: impl FnOnce(&mut Inventory) -> R) -> Option<R> {
        let inventory = self.inner.inventories.get(&id)?;
        let mut guard = inventory.lock().unwrap_or_else(|p| p.into_inner());
        Some(f(&mut guard))
    }

    /// Move items between two inventories, both locked for the whole move.
    /// With `all`, either the whole quantity moves or nothing does.
    pub fn move_items(
        &self,
        from: InventoryId,
        to: InventoryId,
        quantity: u32,
        item: &str,
        all: bool,
    ) -> Option<u32> {
        if from == to {
            warn!(target: "server", "Inventory {} can't move items to itself", from);
            return Some(0);
        }
        let src = self.inner.inventories.get(&from)?;
        let dst = self.inner.inventories.get(&to)?;

        // Lower id first, so two opposite moves can't deadlock.
        let (mut src, mut dst) = if from < to {
            let s = src.lock().unwrap_or_else(|p| p.into_inner());
            let d = dst.lock().unwrap_or_else(|p| p.into_inner());
            (s, d)
        } else {
            let d = dst.lock().unwrap_or_else(|p| p.into_inner());
            let s = src.lock().unwrap_or_else(|p| p.into_inner());
            (s, d)
        };

        Some(if all {
            src.move_all_to(&mut dst, quantity, item)
        } else {
            src.move_to(&mut dst, quantity, item)
        })
    }

    /* Artifacts */

    pub fn new_artifact(&self, name: impl Into<String>) -> ArtifactId {
        let id = self.inner.artifact_ids.next();
        self.inner
            .artifacts
            .insert(id, Arc::new(Mutex::new(Artifact::new(name))));
        id
    }

    pub fn del_artifact(&self, id: ArtifactId) -> bool {
        self.inner.artifacts.remove(&id).is_some()
    }

    pub fn with_artifact<R>(&self, id: ArtifactId, f: impl FnOnce(&mut Artifact) -> R) -> Option<R> {
        let artifact = self.inner.artifacts.get(&id)?;
        let mut guard = artifact.lock().unwrap_or_else(|p| p.into_inner());
        Some(f(&mut guard))
    }

    /* Scripts */

    /// Run a script, logging its failure instead of propagating it.
    pub fn execute(&self, script: &Script, player: Option<PlayerId>, arg: Option<&str>) {
        if let Err(e) = self.run_engine(|engine| engine.execute(script, player, arg)) {
            match player {
                Some(player) => {
                    warn!(target: "scripting", "Script failed for player {}: {}", player, e)
                }
                None => warn!(target: "scripting", "Script failed: {}", e),
            }
        }
    }

    /// Run a script file, typically the init script.
    pub fn run_file(&self, path: &Path) -> Result<(), ScriptError> {
        info!(target: "scripting", "Running {}", path.display());
        self.run_engine(|engine| engine.run_file(path))
    }

    /// Call into the engine, turning a panic into a [`ScriptError`]. Nothing
    /// that runs scripts dies with them.
    fn run_engine(
        &self,
        call: impl FnOnce(&dyn ScriptEngine) -> Result<(), ScriptError>,
    ) -> Result<(), ScriptError> {
        let engine = &*self.inner.engine;
        match panic::catch_unwind(AssertUnwindSafe(|| call(engine))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(&*payload);
                error!(target: "scripting", "Script engine panicked: {}", message);
                Err(ScriptError::Panicked(message))
            }
        }
    }

    /* Lifecycle */

    /// Tear the whole world down and release [`wait_for_termination`].
    ///
    /// [`wait_for_termination`]: Self::wait_for_termination
    pub fn halt(&self) {
        self.close();
        if let Some(task) = self
            .inner
            .timer_task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            task.abort();
        }
        self.inner.timers.clear();
        self.inner.actions.clear();

        for zone in self.inner.zones.drain() {
            zone.evict_all();
        }
        for player in self.inner.players.drain() {
            player.destroy();
        }
        self.inner.inventories.drain();
        self.inner.artifacts.drain();

        let mut terminated = self.inner.terminated.lock().unwrap_or_else(|p| p.into_inner());
        *terminated = true;
        self.inner.terminated_cv.notify_all();
        info!(target: "server", "Server halted");
    }

    pub fn is_terminated(&self) -> bool {
        *self.inner.terminated.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Block the calling thread until [`halt`](Self::halt) has run.
    ///
    /// Never call this from inside the runtime; use `spawn_blocking`.
    pub fn wait_for_termination(&self) {
        let mut terminated = self.inner.terminated.lock().unwrap_or_else(|p| p.into_inner());
        while !*terminated {
            terminated = self
                .inner
                .terminated_cv
                .wait(terminated)
                .unwrap_or_else(|p| p.into_inner());
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn accept_loop(server: WeakServer, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let Some(server) = server.upgrade() else {
                    break;
                };
                info!(target: "net", "Got connection from {}", peer);
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(target: "net", "Unable to set TCP_NODELAY for {}: {}", peer, e);
                }
                let (read, write) = stream.into_split();
                server.admit(read, write, Some(peer));
            }
            Err(e) => {
                warn!(target: "net", "Accepting a connection failed: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoScripts;

    impl ScriptEngine for NoScripts {
        fn execute(&self, _: &Script, _: Option<PlayerId>, _: Option<&str>) -> Result<(), ScriptError> {
            Ok(())
        }

        fn spawn(&self, _: PlayerId) -> Result<(), ScriptError> {
            Ok(())
        }
    }

    #[test]
    fn build_requires_engine() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err = ServerBuilder::new()
            .with_runtime(rt.handle().clone())
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingEngine));
    }

    #[test]
    fn build_requires_runtime() {
        let err = ServerBuilder::new()
            .with_engine(|_| Arc::new(NoScripts))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::NoRuntime));
    }

    #[tokio::test]
    async fn engine_factory_sees_the_server() {
        let server = Server::builder()
            .with_engine(|weak| {
                assert!(weak.upgrade().is_none(), "not constructed yet");
                Arc::new(NoScripts)
            })
            .build()
            .unwrap();
        assert!(!server.is_terminated());
        assert_eq!(server.port(), 0);
    }

    struct Explosive;

    impl ScriptEngine for Explosive {
        fn execute(&self, script: &Script, _: Option<PlayerId>, _: Option<&str>) -> Result<(), ScriptError> {
            if script.source() == "boom" {
                panic!("boom");
            }
            Ok(())
        }

        fn spawn(&self, _: PlayerId) -> Result<(), ScriptError> {
            panic!("spawn went wrong");
        }
    }

    #[tokio::test]
    async fn panicking_scripts_are_contained() {
        let server = Server::builder()
            .with_engine(|_| Arc::new(Explosive))
            .build()
            .unwrap();
        server.add_timer(1, Script::from("boom"));
        server.add_timer(1, Script::from("fine"));
        assert_eq!(server.tick_timers(), 2);
        assert_eq!(server.timer_count(), 0);

        let (_client_end, server_end) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(server_end);
        assert!(server.admit(reader, writer, None).is_none());
        assert_eq!(server.player_count(), 0);
    }

    #[tokio::test]
    async fn forgetting_a_replaced_player_keeps_the_new_one() {
        let server = Server::builder()
            .with_engine(|_| Arc::new(NoScripts))
            .build()
            .unwrap();
        let player = |server: &Server| {
            let (tx, _rx) = mpsc::unbounded_channel();
            Arc::new(Player::new(PlayerId(5), None, server.downgrade(), tx, None))
        };
        let old = player(&server);
        let new = player(&server);
        server.add_player(Arc::clone(&old));
        server.add_player(Arc::clone(&new));
        assert!(!old.is_alive());

        assert!(!server.forget_player(&old));
        assert!(Arc::ptr_eq(&server.get_player(PlayerId(5)).unwrap(), &new));
        assert!(server.forget_player(&new));
        assert!(server.get_player(PlayerId(5)).is_none());

        server.add_player(Arc::clone(&new));
        assert!(server.rem_player(PlayerId(5)));
        assert!(!server.rem_player(PlayerId(5)));
        assert!(new.is_alive(), "rem_player only deregisters");
    }

    #[tokio::test]
    async fn move_items_to_self_moves_nothing() {
        let server = Server::builder()
            .with_engine(|_| Arc::new(NoScripts))
            .build()
            .unwrap();
        let bag = server.new_inventory(10);
        server.with_inventory(bag, |inv| inv.add(3, "coin"));
        assert_eq!(server.move_items(bag, bag, 3, "coin", false), Some(0));
        assert_eq!(server.with_inventory(bag, |inv| inv.get("coin")), Some(3));
    }
}
