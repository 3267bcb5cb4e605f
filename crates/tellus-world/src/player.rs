use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::aspect::Aspect;
use crate::connection::{self, BoxedReader, LineReader};
use crate::gauge::{Edges, Gauge, GaugeSpec};
use crate::ids::{PlayerId, ZoneId};
use crate::protocol::{is_token, Outbound};
use crate::script::Script;
use crate::server::{Server, WeakServer};
use crate::tags::Tags;
use crate::zone::Zone;

/// Snapshot of what other players can see of a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub aspect: Aspect,
    pub zone: Option<ZoneId>,
    pub x: u32,
    pub y: u32,
}

impl PlayerView {
    pub(crate) fn update_message(&self) -> Outbound {
        Outbound::Player {
            id: self.id,
            x: self.x,
            y: self.y,
            aspect: self.aspect.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug)]
struct PlayerState {
    name: String,
    aspect: Aspect,
    zone: Option<ZoneId>,
    x: u32,
    y: u32,
    on_death: Option<Script>,
    gauges: BTreeMap<String, Gauge>,
    ghost: bool,
    tags: Tags,
}

impl PlayerState {
    fn view(&self, id: PlayerId) -> PlayerView {
        PlayerView {
            id,
            name: self.name.clone(),
            aspect: self.aspect.clone(),
            zone: self.zone.clone(),
            x: self.x,
            y: self.y,
        }
    }
}

/// One connected client and its avatar.
///
/// Position, zone and gauges live behind `state`, which is only ever held
/// for short, non-blocking sections and never while a zone lock is being
/// acquired. Relocations (`spawn`, `change_zone`, `set_xy`, `move_by`) are
/// additionally serialised per player by `motion`, so concurrent moves of the
/// same player apply one after the other and the last one wins.
pub struct Player {
    id: PlayerId,
    peer: Option<SocketAddr>,
    server: WeakServer,
    outbound: Mutex<Option<UnboundedSender<Outbound>>>,
    reader: Mutex<Option<LineReader<BoxedReader>>>,
    alive: AtomicBool,
    stop: Notify,
    motion: Mutex<()>,
    state: Mutex<PlayerState>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl Player {
    pub(crate) fn new(
        id: PlayerId,
        peer: Option<SocketAddr>,
        server: WeakServer,
        outbound: UnboundedSender<Outbound>,
        reader: Option<LineReader<BoxedReader>>,
    ) -> Self {
        Self {
            id,
            peer,
            server,
            outbound: Mutex::new(Some(outbound)),
            reader: Mutex::new(reader),
            alive: AtomicBool::new(true),
            stop: Notify::new(),
            motion: Mutex::new(()),
            state: Mutex::new(PlayerState {
                name: format!("player{id}"),
                aspect: Aspect::default(),
                zone: None,
                x: 0,
                y: 0,
                on_death: None,
                gauges: BTreeMap::new(),
                ghost: false,
                tags: Tags::new(),
            }),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn server(&self) -> Option<Server> {
        self.server.upgrade()
    }

    pub fn view(&self) -> PlayerView {
        self.state().view(self.id)
    }

    pub fn name(&self) -> String {
        self.state().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let view = {
            let mut state = self.state();
            state.name = name.into();
            state.view(self.id)
        };
        self.announce(&view);
    }

    pub fn aspect(&self) -> Aspect {
        self.state().aspect.clone()
    }

    /// Change the player's look and show it to everyone in its zone.
    pub fn set_aspect(&self, aspect: Aspect) {
        let view = {
            let mut state = self.state();
            state.aspect = aspect;
            state.view(self.id)
        };
        self.announce(&view);
    }

    pub fn zone(&self) -> Option<ZoneId> {
        self.state().zone.clone()
    }

    pub fn position(&self) -> (u32, u32) {
        let state = self.state();
        (state.x, state.y)
    }

    pub fn on_death(&self) -> Option<Script> {
        self.state().on_death.clone()
    }

    pub fn set_on_death(&self, script: Option<Script>) {
        self.state().on_death = script;
    }

    pub fn is_ghost(&self) -> bool {
        self.state().ghost
    }

    pub fn set_ghost(&self, ghost: bool) {
        self.state().ghost = ghost;
    }

    pub fn tag(&self, key: &str) -> Option<String> {
        self.state().tags.get(key).map(str::to_string)
    }

    pub fn set_tag(&self, key: &str, value: &str) {
        self.state().tags.set(key, value);
    }

    pub fn del_tag(&self, key: &str) -> bool {
        self.state().tags.remove(key)
    }

    /// Start the connection reader and place the player for the first time.
    ///
    /// The reader is started at most once per player, on the first spawn.
    pub fn spawn(self: &Arc<Self>, zone: &Arc<Zone>, x: u32, y: u32) -> bool {
        if !self.change_zone(zone, x, y) {
            return false;
        }
        let reader = self.reader.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let (Some(lines), Some(server)) = (reader, self.server()) {
            debug!(target: "player", "Starting reader for player {}", self.id);
            server
                .runtime()
                .spawn(connection::read_loop(Arc::clone(self), lines));
        }
        true
    }

    /// Leave the current zone (if any) and enter `zone` at `(x, y)`.
    ///
    /// Coordinates must lie inside the zone; passability is not checked.
    pub fn change_zone(&self, zone: &Arc<Zone>, x: u32, y: u32) -> bool {
        if !zone.contains(i64::from(x), i64::from(y)) {
            warn!(
                target: "player",
                "Player {} can't enter zone '{}' at ({}, {}): out of bounds",
                self.id,
                zone.id(),
                x,
                y
            );
            return false;
        }
        let _motion = self.motion();
        if !self.is_alive() {
            return false;
        }
        let (previous, view) = {
            let mut state = self.state();
            let previous = state.zone.replace(zone.id().clone());
            state.x = x;
            state.y = y;
            (previous, state.view(self.id))
        };

        if let Some(previous) = previous {
            if let Some(old) = self.server().and_then(|s| s.get_zone(previous.as_str())) {
                old.exit_player(self.id);
            }
        }

        if zone.enter_player(self, &view) {
            return true;
        }

        warn!(target: "player", "Zone '{}' is closed, player {} stays outside", zone.id(), self.id);
        let mut state = self.state();
        if state.zone.as_ref() == Some(zone.id()) {
            state.zone = None;
        }
        false
    }

    /// Teleport within the current zone. Passability is not checked.
    pub fn set_xy(&self, x: u32, y: u32) -> bool {
        let Some(zone) = self.current_zone() else {
            warn!(target: "player", "Player {} has no zone to be placed in", self.id);
            return false;
        };
        if !zone.contains(i64::from(x), i64::from(y)) {
            warn!(
                target: "player",
                "Player {} can't be placed at ({}, {}): outside zone '{}'",
                self.id,
                x,
                y,
                zone.id()
            );
            return false;
        }

        let _motion = self.motion();
        let view = {
            let mut state = self.state();
            if state.zone.as_ref() != Some(zone.id()) {
                return false;
            }
            state.x = x;
            state.y = y;
            state.view(self.id)
        };
        zone.update_player(&view);
        true
    }

    /// Step by `(dx, dy)` if the target place can be landed on, then run the
    /// target's on-walk script with this player as context.
    pub fn move_by(&self, dx: i64, dy: i64) -> bool {
        let Some(server) = self.server() else {
            return false;
        };

        let landed = {
            let _motion = self.motion();
            let (zone_id, x, y) = {
                let state = self.state();
                (state.zone.clone(), state.x, state.y)
            };
            let Some(zone) = zone_id.and_then(|id| server.get_zone(id.as_str())) else {
                debug!(target: "player", "Player {} can't move: not in a zone", self.id);
                return false;
            };

            let tx = i64::from(x).saturating_add(dx);
            let ty = i64::from(y).saturating_add(dy);
            if !zone.can_land_player(tx, ty) {
                return false;
            }

            let view = {
                let mut state = self.state();
                // can_land_player() only accepts in-bounds coordinates
                state.x = tx as u32;
                state.y = ty as u32;
                state.view(self.id)
            };
            zone.update_player(&view);
            zone.on_walk(tx, ty)
        };

        if let Some(script) = landed {
            server.execute(&script, Some(self.id), None);
        }
        true
    }

    fn current_zone(&self) -> Option<Arc<Zone>> {
        let zone = self.zone()?;
        self.server()?.get_zone(zone.as_str())
    }

    fn announce(&self, view: &PlayerView) {
        if let Some(zone) = self.current_zone() {
            zone.update_player(view);
        }
    }

    /// Called by a zone that is being torn down while this player stands in it.
    pub(crate) fn evicted_from(&self, zone: &ZoneId) {
        let mut state = self.state();
        if state.zone.as_ref() == Some(zone) {
            state.zone = None;
            debug!(target: "player", "Player {} evicted from zone '{}'", self.id, zone);
        }
    }

    /// Add a gauge. Gauge names are unique per player.
    pub fn new_gauge(&self, spec: GaugeSpec) -> bool {
        if !is_token(&spec.name) {
            warn!(target: "player", "Gauge name {:?} must be a single word", spec.name);
            return false;
        }
        let mut state = self.state();
        if state.gauges.contains_key(&spec.name) {
            warn!(target: "player", "Player {} already has a gauge named '{}'", self.id, spec.name);
            return false;
        }
        let gauge = Gauge::new(spec);
        if gauge.is_visible() {
            self.send(gauge.update_message());
        }
        state.gauges.insert(gauge.name().to_string(), gauge);
        true
    }

    pub fn has_gauge(&self, name: &str) -> bool {
        self.state().gauges.contains_key(name)
    }

    /// Snapshot of a gauge.
    pub fn gauge(&self, name: &str) -> Option<Gauge> {
        self.state().gauges.get(name).cloned()
    }

    pub fn gauge_names(&self) -> Vec<String> {
        self.state().gauges.keys().cloned().collect()
    }

    pub fn del_gauge(&self, name: &str) -> bool {
        let mut state = self.state();
        let Some(gauge) = state.gauges.remove(name) else {
            return false;
        };
        if gauge.is_visible() {
            self.send(Outbound::NoGauge(gauge.name().to_string()));
        }
        true
    }

    pub fn rename_gauge(&self, from: &str, to: &str) -> bool {
        if !is_token(to) {
            warn!(target: "player", "Gauge name {:?} must be a single word", to);
            return false;
        }
        if from == to {
            return self.has_gauge(from);
        }
        let mut state = self.state();
        if state.gauges.contains_key(to) {
            warn!(target: "player", "Player {} already has a gauge named '{}'", self.id, to);
            return false;
        }
        let Some(mut gauge) = state.gauges.remove(from) else {
            return false;
        };
        let visible = gauge.is_visible();
        if visible {
            self.send(Outbound::NoGauge(from.to_string()));
        }
        gauge.set_name(to.to_string());
        if visible {
            self.send(gauge.update_message());
        }
        state.gauges.insert(to.to_string(), gauge);
        true
    }

    /// Apply `op` to a gauge, push the change to the client if it can see
    /// the gauge, then run the edge scripts `op` triggered.
    ///
    /// The push happens under the player lock so that concurrent updates of
    /// the same gauge reach the client in the order they were applied.
    pub fn update_gauge(&self, name: &str, op: impl FnOnce(&mut Gauge) -> Edges) -> bool {
        let scripts = {
            let mut state = self.state();
            let Some(gauge) = state.gauges.get_mut(name) else {
                return false;
            };
            let was_visible = gauge.is_visible();
            let before = gauge.update_message();

            let edges = op(gauge);

            let after = gauge.update_message();
            if gauge.is_visible() {
                if !was_visible || before != after {
                    self.send(after);
                }
            } else if was_visible {
                self.send(Outbound::NoGauge(gauge.name().to_string()));
            }
            gauge.edge_scripts(edges)
        };

        if !scripts.is_empty() {
            if let Some(server) = self.server() {
                for script in &scripts {
                    server.execute(script, Some(self.id), None);
                }
            }
        }
        true
    }

    /// Queue a notification for this player's client. Dropped silently once
    /// the connection is gone.
    pub fn send(&self, msg: Outbound) {
        let outbound = self.outbound.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(tx) = outbound.as_ref() {
            let _ = tx.send(msg);
        }
    }

    pub fn message(&self, text: &str) {
        self.send(Outbound::Message(text.to_string()));
    }

    pub fn hint(&self, aspect: Aspect, text: &str) {
        self.send(Outbound::Hint {
            aspect,
            text: text.to_string(),
        });
    }

    pub fn follow(&self, target: PlayerId) {
        self.send(Outbound::Follow(target));
    }

    pub fn update_player(&self, view: &PlayerView) {
        self.send(view.update_message());
    }

    pub fn update_player_exit(&self, id: PlayerId) {
        self.send(Outbound::PlayerExit(id));
    }

    pub fn update_floor(&self, width: u32, height: u32, aspects: Vec<Aspect>) {
        self.send(Outbound::Floor {
            width,
            height,
            aspects,
        });
    }

    pub fn update_tile(&self, x: u32, y: u32, aspect: Aspect) {
        self.send(Outbound::Tile { x, y, aspect });
    }

    pub fn update_inventory(&self, item: &str, aspect: Aspect) {
        self.send(Outbound::Inventory {
            item: item.to_string(),
            aspect,
        });
    }

    pub fn update_no_inventory(&self, item: &str) {
        self.send(Outbound::NoInventory(item.to_string()));
    }

    pub fn add_pickup(&self, item: &str, aspect: Aspect) {
        self.send(Outbound::Pickup {
            item: item.to_string(),
            aspect,
        });
    }

    pub fn remove_pickup(&self, item: &str) {
        self.send(Outbound::NoPickup(item.to_string()));
    }

    /// Resolves once the player has been destroyed.
    pub(crate) fn stopped(&self) -> tokio::sync::futures::Notified<'_> {
        self.stop.notified()
    }

    /// Take the player out of the world: stop its reader, leave its zone,
    /// retract its visible gauges and close its connection. Idempotent.
    pub fn destroy(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        self.stop.notify_one();
        let _motion = self.motion();

        let (zone, retracted) = {
            let mut state = self.state();
            let gauges = std::mem::take(&mut state.gauges);
            let retracted: Vec<String> = gauges
                .into_values()
                .filter(Gauge::is_visible)
                .map(|g| g.name().to_string())
                .collect();
            (state.zone.take(), retracted)
        };

        if let Some(zone) = zone.and_then(|id| self.server()?.get_zone(id.as_str())) {
            zone.exit_player(self.id);
        }
        for name in retracted {
            self.send(Outbound::NoGauge(name));
        }

        // Dropping the sender lets the writer flush what is queued and close.
        self.outbound.lock().unwrap_or_else(|p| p.into_inner()).take();
        debug!(target: "player", "Player {} destroyed", self.id);
    }

    /// The connection went away on its own.
    pub(crate) fn disconnected(self: &Arc<Self>) {
        self.destroy();
        if let Some(server) = self.server() {
            server.forget_player(self);
        }
    }

    fn state(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn motion(&self) -> MutexGuard<'_, ()> {
        self.motion.lock().unwrap_or_else(|p| p.into_inner())
    }
}
