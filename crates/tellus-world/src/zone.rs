use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::aspect::Aspect;
use crate::ids::{PlayerId, ZoneId};
use crate::player::{Player, PlayerView};
use crate::protocol::Outbound;
use crate::script::Script;
use crate::server::WeakServer;
use crate::tags::Tags;

/// The part of a place clients get to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub aspect: Aspect,
    pub passable: bool,
}

impl Tile {
    pub fn new(aspect: Aspect, passable: bool) -> Self {
        Self { aspect, passable }
    }
}

/// One grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub tile: Tile,
    pub on_walk: Option<Script>,
    pub tags: Tags,
}

impl Place {
    fn new(tile: Tile) -> Self {
        Self {
            tile,
            on_walk: None,
            tags: Tags::new(),
        }
    }
}

#[derive(Debug)]
struct ZoneState {
    name: String,
    places: Vec<Place>,
    residents: BTreeSet<PlayerId>,
    /// Set once the zone has been deleted or replaced; nobody can enter it anymore.
    closed: bool,
}

/// A grid of places plus the roster of players standing in it.
///
/// The grid and the roster sit behind one lock that is held across every
/// mutate-then-broadcast sequence, so all residents observe the zone's
/// changes in the same order. Residents are stored by id and resolved through
/// the server's player registry; ids whose player is gone are pruned the next
/// time the roster is walked.
#[derive(Debug)]
pub struct Zone {
    id: ZoneId,
    width: u32,
    height: u32,
    server: WeakServer,
    state: Mutex<ZoneState>,
}

impl Zone {
    pub(crate) fn new(
        server: WeakServer,
        id: ZoneId,
        name: String,
        width: u32,
        height: u32,
        base: Tile,
    ) -> Self {
        let cells = width as usize * height as usize;
        Self {
            id,
            width,
            height,
            server,
            state: Mutex::new(ZoneState {
                name,
                places: vec![Place::new(base); cells],
                residents: BTreeSet::new(),
                closed: false,
            }),
        }
    }

    pub fn id(&self) -> &ZoneId {
        &self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.lock().name = name.into();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        self.index(x, y).is_some()
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        let x = u32::try_from(x).ok().filter(|&x| x < self.width)?;
        let y = u32::try_from(y).ok().filter(|&y| y < self.height)?;
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn get_place(&self, x: i64, y: i64) -> Option<Place> {
        let i = self.index(x, y)?;
        Some(self.lock().places[i].clone())
    }

    pub fn get_tile(&self, x: i64, y: i64) -> Option<Tile> {
        let i = self.index(x, y)?;
        Some(self.lock().places[i].tile.clone())
    }

    /// Replace the tile of a cell and broadcast it to every resident.
    pub fn set_tile(&self, x: i64, y: i64, tile: Tile) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        let mut state = self.lock();
        let aspect = tile.aspect.clone();
        state.places[i].tile = tile;
        // index() guarantees both fit in u32
        let msg = Outbound::Tile {
            x: x as u32,
            y: y as u32,
            aspect,
        };
        self.broadcast(&mut state, &msg);
        true
    }

    /// Passability is not visible to clients, so nothing is broadcast.
    pub fn set_passable(&self, x: i64, y: i64, passable: bool) -> bool {
        self.with_place(x, y, |place| place.tile.passable = passable)
            .is_some()
    }

    pub fn set_on_walk(&self, x: i64, y: i64, script: Option<Script>) -> bool {
        self.with_place(x, y, |place| place.on_walk = script).is_some()
    }

    pub fn on_walk(&self, x: i64, y: i64) -> Option<Script> {
        self.with_place(x, y, |place| place.on_walk.clone()).flatten()
    }

    pub fn tag(&self, x: i64, y: i64, key: &str) -> Option<String> {
        self.with_place(x, y, |place| place.tags.get(key).map(str::to_string))
            .flatten()
    }

    pub fn set_tag(&self, x: i64, y: i64, key: &str, value: &str) -> bool {
        self.with_place(x, y, |place| place.tags.set(key, value))
            .is_some()
    }

    /// `None` when out of bounds, otherwise whether the tag existed.
    pub fn del_tag(&self, x: i64, y: i64, key: &str) -> Option<bool> {
        self.with_place(x, y, |place| place.tags.remove(key))
    }

    fn with_place<R>(&self, x: i64, y: i64, f: impl FnOnce(&mut Place) -> R) -> Option<R> {
        let i = self.index(x, y)?;
        Some(f(&mut self.lock().places[i]))
    }

    /// Whether a player may step onto `(x, y)`.
    pub fn can_land_player(&self, x: i64, y: i64) -> bool {
        self.get_tile(x, y).is_some_and(|tile| tile.passable)
    }

    /// Broadcast a free-form message to every resident.
    pub fn event(&self, message: &str) {
        let mut state = self.lock();
        self.broadcast(&mut state, &Outbound::Message(message.to_string()));
    }

    /// Current residents, pruning the ones that no longer resolve.
    pub fn residents(&self) -> Vec<PlayerId> {
        let mut state = self.lock();
        self.prune(&mut state);
        state.residents.iter().copied().collect()
    }

    pub fn has_resident(&self, id: PlayerId) -> bool {
        self.lock().residents.contains(&id)
    }

    /// Add `player` to the roster, send it the floor and the other residents,
    /// and announce it to everyone. Fails once the zone is closed.
    pub(crate) fn enter_player(&self, player: &Player, view: &PlayerView) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.residents.insert(view.id);

        player.update_floor(
            self.width,
            self.height,
            state.places.iter().map(|p| p.tile.aspect.clone()).collect(),
        );

        let mut stale = Vec::new();
        for &other in state.residents.iter().filter(|&&id| id != view.id) {
            match self.resolve(other) {
                Some(resident) => player.update_player(&resident.view()),
                None => stale.push(other),
            }
        }
        for id in stale {
            state.residents.remove(&id);
        }

        self.broadcast(&mut state, &view.update_message());
        debug!(target: "zone", "Player {} entered zone '{}'", view.id, self.id);
        true
    }

    /// Remove a player from the roster and tell the remaining residents.
    pub(crate) fn exit_player(&self, id: PlayerId) -> bool {
        let mut state = self.lock();
        if !state.residents.remove(&id) {
            return false;
        }
        self.broadcast(&mut state, &Outbound::PlayerExit(id));
        debug!(target: "zone", "Player {} left zone '{}'", id, self.id);
        true
    }

    /// Broadcast a resident's new position or look.
    pub(crate) fn update_player(&self, view: &PlayerView) {
        let mut state = self.lock();
        if state.residents.contains(&view.id) {
            self.broadcast(&mut state, &view.update_message());
        }
    }

    /// Close the zone and force every resident out of it. The players
    /// themselves survive, zoneless.
    pub(crate) fn evict_all(&self) {
        let mut state = self.lock();
        state.closed = true;
        let residents = std::mem::take(&mut state.residents);
        for id in residents {
            if let Some(player) = self.resolve(id) {
                player.evicted_from(&self.id);
            }
        }
        info!(target: "zone", "Zone '{}' closed", self.id);
    }

    fn broadcast(&self, state: &mut ZoneState, msg: &Outbound) {
        let mut stale = Vec::new();
        for &id in &state.residents {
            match self.resolve(id) {
                Some(player) => player.send(msg.clone()),
                None => stale.push(id),
            }
        }
        for id in stale {
            state.residents.remove(&id);
        }
    }

    fn prune(&self, state: &mut ZoneState) {
        let stale: Vec<PlayerId> = state
            .residents
            .iter()
            .copied()
            .filter(|&id| self.resolve(id).is_none())
            .collect();
        for id in stale {
            state.residents.remove(&id);
        }
    }

    fn resolve(&self, id: PlayerId) -> Option<Arc<Player>> {
        self.server
            .upgrade()?
            .get_player(id)
            .filter(|player| player.is_alive())
    }

    fn lock(&self) -> MutexGuard<'_, ZoneState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}
