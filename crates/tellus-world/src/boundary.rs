//! The world as seen from a script.
//!
//! [`Boundary`] exposes every world operation in terms of primitive values:
//! entities are named by their ids, numbers are `i64`, text is `&str`.
//! Nothing here ever fails loudly. A missing entity or an invalid argument is
//! logged on the `scripting` target and answered with `None` (queries) or
//! `false` (commands), so a script bug never takes the server down.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::aspect::Aspect;
use crate::gauge::{Edges, Gauge, GaugeSpec};
use crate::ids::{ArtifactId, InventoryId, PlayerId, TimerId};
use crate::inventory::Inventory;
use crate::player::Player;
use crate::protocol::is_token;
use crate::script::Script;
use crate::server::{Server, WeakServer};
use crate::zone::{Tile, Zone};

/// Primitive-typed facade over a [`Server`].
#[derive(Debug, Clone)]
pub struct Boundary {
    server: WeakServer,
}

impl Boundary {
    pub fn new(server: WeakServer) -> Self {
        Self { server }
    }

    fn server(&self) -> Option<Server> {
        self.server.upgrade()
    }

    fn player(&self, id: i64) -> Option<Arc<Player>> {
        let raw = id_arg(id, "player")?;
        let player = self.server()?.get_player(PlayerId(raw));
        if player.is_none() {
            warn!(target: "scripting", "Player {} doesn't exist", id);
        }
        player
    }

    fn zone(&self, id: &str) -> Option<Arc<Zone>> {
        let zone = self.server()?.get_zone(id);
        if zone.is_none() {
            warn!(target: "scripting", "Zone '{}' doesn't exist", id);
        }
        zone
    }

    /// The zone, provided `(x, y)` lies inside it.
    fn place(&self, zone: &str, x: i64, y: i64) -> Option<Arc<Zone>> {
        let zone = self.zone(zone)?;
        if !zone.contains(x, y) {
            warn!(target: "scripting", "Place ({}, {}) is outside zone '{}'", x, y, zone.id());
            return None;
        }
        Some(zone)
    }

    fn gauge<R>(&self, player: i64, name: &str, f: impl FnOnce(&Gauge) -> R) -> Option<R> {
        let gauge = self.player(player)?.gauge(name);
        if gauge.is_none() {
            warn!(target: "scripting", "Gauge '{}' of player {} doesn't exist", name, player);
        }
        gauge.as_ref().map(f)
    }

    fn update_gauge(&self, player: i64, name: &str, op: impl FnOnce(&mut Gauge) -> Edges) -> bool {
        let Some(p) = self.player(player) else {
            return false;
        };
        let updated = p.update_gauge(name, op);
        if !updated {
            warn!(target: "scripting", "Gauge '{}' of player {} doesn't exist", name, player);
        }
        updated
    }

    fn inventory<R>(&self, id: i64, f: impl FnOnce(&mut Inventory) -> R) -> Option<R> {
        let raw = id_arg(id, "inventory")?;
        let result = self.server()?.with_inventory(InventoryId(raw), f);
        if result.is_none() {
            warn!(target: "scripting", "Inventory {} doesn't exist", id);
        }
        result
    }

    /* Logging and server */

    pub fn info(&self, message: &str) {
        info!(target: "script", "{}", message);
    }

    pub fn warning(&self, message: &str) {
        warn!(target: "script", "{}", message);
    }

    /// Log at error level and halt the server.
    pub fn fatal(&self, message: &str) {
        error!(target: "script", "{}", message);
        self.halt();
    }

    pub fn set_verbose(&self, verbose: bool) -> bool {
        self.server().map(|s| s.set_verbose(verbose)).is_some()
    }

    pub fn is_verbose(&self) -> bool {
        self.server().is_some_and(|s| s.is_verbose())
    }

    pub fn halt(&self) -> bool {
        self.server().map(|s| s.halt()).is_some()
    }

    pub fn open(&self, port: i64) -> bool {
        let Ok(port) = u16::try_from(port) else {
            warn!(target: "scripting", "Invalid port {}", port);
            return false;
        };
        let Some(server) = self.server() else {
            return false;
        };
        match server.open(port) {
            Ok(_) => true,
            Err(e) => {
                error!(target: "net", "{}", e);
                false
            }
        }
    }

    pub fn close(&self) -> bool {
        self.server().map(|s| s.close()).is_some()
    }

    pub fn is_open(&self) -> bool {
        self.server().is_some_and(|s| s.is_open())
    }

    pub fn port(&self) -> i64 {
        self.server().map(|s| i64::from(s.port())).unwrap_or(0)
    }

    pub fn register_aspect(&self, aspect: &str, code: i64, passable: Option<bool>) -> bool {
        if !token_arg(aspect, "aspect") {
            return false;
        }
        self.server()
            .map(|s| s.aspects().register(Aspect::from(aspect), code, passable))
            .is_some()
    }

    pub fn aspect_code(&self, aspect: &str) -> i64 {
        self.server()
            .map(|s| s.aspects().code(&Aspect::from(aspect)))
            .unwrap_or(0)
    }

    /* Actions */

    pub fn add_action(&self, trigger: &str, script: &str) -> bool {
        if !token_arg(trigger, "action trigger") {
            return false;
        }
        self.server()
            .map(|s| s.add_action(trigger, Script::from(script)))
            .is_some()
    }

    pub fn get_action(&self, trigger: &str) -> Option<String> {
        let script = self.server()?.get_action(trigger);
        if script.is_none() {
            warn!(target: "scripting", "Action '{}' doesn't exist", trigger);
        }
        script.map(|s| s.source().to_string())
    }

    pub fn delete_action(&self, trigger: &str) -> bool {
        self.server().is_some_and(|s| s.del_action(trigger))
    }

    /* Timers */

    pub fn create_timer(&self, ticks: i64, script: &str) -> Option<i64> {
        let ticks = count_arg(ticks, "timer duration")?;
        let id = self.server()?.add_timer(ticks, Script::from(script));
        Some(id_out(id.get()))
    }

    pub fn delete_timer(&self, id: i64) -> bool {
        let Some(raw) = id_arg(id, "timer") else {
            return false;
        };
        let deleted = self.server().is_some_and(|s| s.del_timer(TimerId(raw)));
        if !deleted {
            warn!(target: "scripting", "Timer {} doesn't exist", id);
        }
        deleted
    }

    pub fn timer_remaining(&self, id: i64) -> i64 {
        id_arg(id, "timer")
            .and_then(|raw| self.server().map(|s| s.timer_remaining(TimerId(raw))))
            .map(i64::from)
            .unwrap_or(0)
    }

    pub fn timer_set_remaining(&self, id: i64, remaining: i64) -> bool {
        let (Some(raw), Some(remaining)) = (id_arg(id, "timer"), count_arg(remaining, "timer duration")) else {
            return false;
        };
        self.server()
            .is_some_and(|s| s.set_timer_remaining(TimerId(raw), remaining))
    }

    pub fn timer_trigger_now(&self, id: i64) -> bool {
        let Some(raw) = id_arg(id, "timer") else {
            return false;
        };
        self.server().is_some_and(|s| s.trigger_timer(TimerId(raw)))
    }

    /* Zones */

    pub fn new_zone(&self, id: &str, name: &str, width: i64, height: i64, aspect: &str) -> bool {
        let (Some(width), Some(height)) = (count_arg(width, "zone width"), count_arg(height, "zone height")) else {
            return false;
        };
        if id.is_empty() {
            warn!(target: "scripting", "Zone id can't be empty");
            return false;
        }
        if !token_arg(aspect, "aspect") {
            return false;
        }
        let Some(server) = self.server() else {
            return false;
        };
        let cap = server.config().max_zone_cells;
        match u64::from(width).checked_mul(u64::from(height)) {
            Some(cells) if cells <= cap => {}
            _ => {
                warn!(
                    target: "scripting",
                    "Zone '{}' of {}x{} exceeds the limit of {} places", id, width, height, cap
                );
                return false;
            }
        }
        server.new_zone(id, name, width, height, Aspect::from(aspect));
        true
    }

    pub fn delete_zone(&self, id: &str) -> bool {
        self.server().is_some_and(|s| s.del_zone(id))
    }

    pub fn zone_exists(&self, id: &str) -> bool {
        self.server().is_some_and(|s| s.get_zone(id).is_some())
    }

    pub fn zone_name(&self, id: &str) -> Option<String> {
        Some(self.zone(id)?.name())
    }

    pub fn zone_set_name(&self, id: &str, name: &str) -> bool {
        self.zone(id).map(|z| z.set_name(name)).is_some()
    }

    pub fn zone_width(&self, id: &str) -> Option<i64> {
        Some(i64::from(self.zone(id)?.width()))
    }

    pub fn zone_height(&self, id: &str) -> Option<i64> {
        Some(i64::from(self.zone(id)?.height()))
    }

    pub fn zone_event(&self, id: &str, message: &str) -> bool {
        self.zone(id).map(|z| z.event(message)).is_some()
    }

    /* Places */

    pub fn place_aspect(&self, zone: &str, x: i64, y: i64) -> Option<String> {
        let tile = self.place(zone, x, y)?.get_tile(x, y)?;
        Some(tile.aspect.to_string())
    }

    /// Also resets the place's passability to the aspect's default.
    pub fn place_set_aspect(&self, zone: &str, x: i64, y: i64, aspect: &str) -> bool {
        let Some(server) = self.server() else {
            return false;
        };
        if !token_arg(aspect, "aspect") {
            return false;
        }
        let Some(zone) = self.place(zone, x, y) else {
            return false;
        };
        let aspect = Aspect::from(aspect);
        let passable = server.aspects().default_passable(&aspect);
        zone.set_tile(x, y, Tile::new(aspect, passable))
    }

    pub fn place_is_passable(&self, zone: &str, x: i64, y: i64) -> Option<bool> {
        Some(self.place(zone, x, y)?.get_tile(x, y)?.passable)
    }

    pub fn place_set_passable(&self, zone: &str, x: i64, y: i64, passable: bool) -> bool {
        self.place(zone, x, y)
            .is_some_and(|z| z.set_passable(x, y, passable))
    }

    pub fn place_on_walk(&self, zone: &str, x: i64, y: i64) -> Option<String> {
        let script = self.place(zone, x, y)?.on_walk(x, y);
        script.map(|s| s.source().to_string())
    }

    pub fn place_set_on_walk(&self, zone: &str, x: i64, y: i64, script: &str) -> bool {
        self.place(zone, x, y)
            .is_some_and(|z| z.set_on_walk(x, y, Some(Script::from(script))))
    }

    pub fn place_reset_on_walk(&self, zone: &str, x: i64, y: i64) -> bool {
        self.place(zone, x, y)
            .is_some_and(|z| z.set_on_walk(x, y, None))
    }

    pub fn place_tag(&self, zone: &str, x: i64, y: i64, key: &str) -> Option<String> {
        self.place(zone, x, y)?.tag(x, y, key)
    }

    pub fn place_set_tag(&self, zone: &str, x: i64, y: i64, key: &str, value: &str) -> bool {
        self.place(zone, x, y)
            .is_some_and(|z| z.set_tag(x, y, key, value))
    }

    pub fn place_del_tag(&self, zone: &str, x: i64, y: i64, key: &str) -> bool {
        self.place(zone, x, y)
            .and_then(|z| z.del_tag(x, y, key))
            .unwrap_or(false)
    }

    /* Players */

    pub fn player_exists(&self, id: i64) -> bool {
        id_arg(id, "player")
            .and_then(|raw| self.server()?.get_player(PlayerId(raw)))
            .is_some()
    }

    pub fn delete_player(&self, id: i64) -> bool {
        let Some(raw) = id_arg(id, "player") else {
            return false;
        };
        self.server().is_some_and(|s| s.del_player(PlayerId(raw)))
    }

    pub fn player_spawn(&self, id: i64, zone: &str, x: i64, y: i64) -> bool {
        let Some(player) = self.player(id) else {
            return false;
        };
        let Some((zone, x, y)) = self.landing(zone, x, y) else {
            return false;
        };
        player.spawn(&zone, x, y)
    }

    pub fn player_change_zone(&self, id: i64, zone: &str, x: i64, y: i64) -> bool {
        let Some(player) = self.player(id) else {
            return false;
        };
        let Some((zone, x, y)) = self.landing(zone, x, y) else {
            return false;
        };
        player.change_zone(&zone, x, y)
    }

    fn landing(&self, zone: &str, x: i64, y: i64) -> Option<(Arc<Zone>, u32, u32)> {
        let zone = self.place(zone, x, y)?;
        // place() checked both against the zone size
        Some((zone, x as u32, y as u32))
    }

    pub fn player_name(&self, id: i64) -> Option<String> {
        Some(self.player(id)?.name())
    }

    pub fn player_set_name(&self, id: i64, name: &str) -> bool {
        self.player(id).map(|p| p.set_name(name)).is_some()
    }

    pub fn player_aspect(&self, id: i64) -> Option<String> {
        Some(self.player(id)?.aspect().to_string())
    }

    pub fn player_set_aspect(&self, id: i64, aspect: &str) -> bool {
        if !token_arg(aspect, "aspect") {
            return false;
        }
        self.player(id)
            .map(|p| p.set_aspect(Aspect::from(aspect)))
            .is_some()
    }

    pub fn player_zone(&self, id: i64) -> Option<String> {
        self.player(id)?.zone().map(|z| z.to_string())
    }

    pub fn player_x(&self, id: i64) -> Option<i64> {
        Some(i64::from(self.player(id)?.position().0))
    }

    pub fn player_y(&self, id: i64) -> Option<i64> {
        Some(i64::from(self.player(id)?.position().1))
    }

    pub fn player_set_xy(&self, id: i64, x: i64, y: i64) -> bool {
        let Some(player) = self.player(id) else {
            return false;
        };
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            warn!(target: "scripting", "Player {} can't be placed at ({}, {})", id, x, y);
            return false;
        };
        player.set_xy(x, y)
    }

    pub fn player_move(&self, id: i64, dx: i64, dy: i64) -> bool {
        self.player(id).is_some_and(|p| p.move_by(dx, dy))
    }

    pub fn player_on_death(&self, id: i64) -> Option<String> {
        self.player(id)?.on_death().map(|s| s.source().to_string())
    }

    pub fn player_set_on_death(&self, id: i64, script: &str) -> bool {
        self.player(id)
            .map(|p| p.set_on_death(Some(Script::from(script))))
            .is_some()
    }

    pub fn player_reset_on_death(&self, id: i64) -> bool {
        self.player(id).map(|p| p.set_on_death(None)).is_some()
    }

    pub fn player_is_ghost(&self, id: i64) -> Option<bool> {
        Some(self.player(id)?.is_ghost())
    }

    pub fn player_set_ghost(&self, id: i64, ghost: bool) -> bool {
        self.player(id).map(|p| p.set_ghost(ghost)).is_some()
    }

    pub fn player_tag(&self, id: i64, key: &str) -> Option<String> {
        self.player(id)?.tag(key)
    }

    pub fn player_set_tag(&self, id: i64, key: &str, value: &str) -> bool {
        self.player(id).map(|p| p.set_tag(key, value)).is_some()
    }

    pub fn player_del_tag(&self, id: i64, key: &str) -> bool {
        self.player(id).is_some_and(|p| p.del_tag(key))
    }

    pub fn player_message(&self, id: i64, text: &str) -> bool {
        self.player(id).map(|p| p.message(text)).is_some()
    }

    pub fn player_hint(&self, id: i64, aspect: &str, text: &str) -> bool {
        if !token_arg(aspect, "aspect") {
            return false;
        }
        self.player(id)
            .map(|p| p.hint(Aspect::from(aspect), text))
            .is_some()
    }

    pub fn player_follow(&self, id: i64, target: i64) -> bool {
        let (Some(player), Some(target)) = (self.player(id), self.player(target)) else {
            return false;
        };
        player.follow(target.id());
        true
    }

    pub fn player_update_inventory(&self, id: i64, item: &str, aspect: &str) -> bool {
        if !token_arg(item, "item") || !token_arg(aspect, "aspect") {
            return false;
        }
        self.player(id)
            .map(|p| p.update_inventory(item, Aspect::from(aspect)))
            .is_some()
    }

    pub fn player_update_no_inventory(&self, id: i64, item: &str) -> bool {
        if !token_arg(item, "item") {
            return false;
        }
        self.player(id)
            .map(|p| p.update_no_inventory(item))
            .is_some()
    }

    pub fn player_add_pickup(&self, id: i64, item: &str, aspect: &str) -> bool {
        if !token_arg(item, "item") || !token_arg(aspect, "aspect") {
            return false;
        }
        self.player(id)
            .map(|p| p.add_pickup(item, Aspect::from(aspect)))
            .is_some()
    }

    pub fn player_remove_pickup(&self, id: i64, item: &str) -> bool {
        if !token_arg(item, "item") {
            return false;
        }
        self.player(id).map(|p| p.remove_pickup(item)).is_some()
    }

    /* Gauges */

    #[allow(clippy::too_many_arguments)]
    pub fn new_gauge(
        &self,
        player: i64,
        name: &str,
        val: i64,
        max: i64,
        aspect_full: &str,
        aspect_empty: &str,
        visible: Option<bool>,
    ) -> bool {
        let Some(max) = count_arg(max, "gauge maximum") else {
            return false;
        };
        if !token_arg(name, "gauge name")
            || !token_arg(aspect_full, "aspect")
            || !token_arg(aspect_empty, "aspect")
        {
            return false;
        }
        let Some(p) = self.player(player) else {
            return false;
        };
        let spec = GaugeSpec::new(name, val, max)
            .with_aspects(Aspect::from(aspect_full), Aspect::from(aspect_empty))
            .with_visible(visible.unwrap_or(true));
        p.new_gauge(spec)
    }

    pub fn gauge_exists(&self, player: i64, name: &str) -> bool {
        id_arg(player, "player")
            .and_then(|raw| self.server()?.get_player(PlayerId(raw)))
            .is_some_and(|p| p.has_gauge(name))
    }

    pub fn delete_gauge(&self, player: i64, name: &str) -> bool {
        let deleted = self.player(player).is_some_and(|p| p.del_gauge(name));
        if !deleted {
            warn!(target: "scripting", "Gauge '{}' of player {} can't be deleted", name, player);
        }
        deleted
    }

    pub fn gauge_set_name(&self, player: i64, name: &str, new_name: &str) -> bool {
        if !token_arg(new_name, "gauge name") {
            return false;
        }
        self.player(player)
            .is_some_and(|p| p.rename_gauge(name, new_name))
    }

    pub fn gauge_val(&self, player: i64, name: &str) -> Option<i64> {
        self.gauge(player, name, |g| i64::from(g.val()))
    }

    pub fn gauge_max(&self, player: i64, name: &str) -> Option<i64> {
        self.gauge(player, name, |g| i64::from(g.max()))
    }

    pub fn gauge_set_val(&self, player: i64, name: &str, val: i64) -> bool {
        self.update_gauge(player, name, |g| g.set_val(val))
    }

    pub fn gauge_increase(&self, player: i64, name: &str, by: i64) -> bool {
        self.update_gauge(player, name, |g| g.increase(by))
    }

    pub fn gauge_decrease(&self, player: i64, name: &str, by: i64) -> bool {
        self.update_gauge(player, name, |g| g.decrease(by))
    }

    pub fn gauge_set_max(&self, player: i64, name: &str, max: i64) -> bool {
        let Some(max) = count_arg(max, "gauge maximum") else {
            return false;
        };
        if !token_arg(name, "gauge name") {
            return false;
        }
        self.update_gauge(player, name, |g| g.set_max(max))
    }

    pub fn gauge_on_full(&self, player: i64, name: &str) -> Option<String> {
        self.gauge(player, name, |g| g.on_full().map(|s| s.source().to_string()))
            .flatten()
    }

    pub fn gauge_set_on_full(&self, player: i64, name: &str, script: Option<&str>) -> bool {
        let script = script.map(Script::from);
        self.update_gauge(player, name, |g| {
            g.set_on_full(script);
            Edges::default()
        })
    }

    pub fn gauge_on_empty(&self, player: i64, name: &str) -> Option<String> {
        self.gauge(player, name, |g| g.on_empty().map(|s| s.source().to_string()))
            .flatten()
    }

    pub fn gauge_set_on_empty(&self, player: i64, name: &str, script: Option<&str>) -> bool {
        let script = script.map(Script::from);
        self.update_gauge(player, name, |g| {
            g.set_on_empty(script);
            Edges::default()
        })
    }

    pub fn gauge_is_visible(&self, player: i64, name: &str) -> Option<bool> {
        self.gauge(player, name, Gauge::is_visible)
    }

    pub fn gauge_set_visible(&self, player: i64, name: &str, visible: bool) -> bool {
        self.update_gauge(player, name, |g| {
            g.set_visible(visible);
            Edges::default()
        })
    }

    /* Inventories */

    pub fn create_inventory(&self, size: i64) -> Option<i64> {
        let size = count_arg(size, "inventory size")?;
        Some(id_out(self.server()?.new_inventory(size).get()))
    }

    pub fn delete_inventory(&self, id: i64) -> bool {
        let Some(raw) = id_arg(id, "inventory") else {
            return false;
        };
        let deleted = self.server().is_some_and(|s| s.del_inventory(InventoryId(raw)));
        if !deleted {
            warn!(target: "scripting", "Inventory {} doesn't exist", id);
        }
        deleted
    }

    pub fn inventory_get(&self, id: i64, item: &str) -> Option<i64> {
        self.inventory(id, |inv| i64::from(inv.get(item)))
    }

    pub fn inventory_get_all(&self, id: i64) -> Option<Vec<(String, i64)>> {
        self.inventory(id, |inv| {
            inv.get_all()
                .into_iter()
                .map(|(item, q)| (item, i64::from(q)))
                .collect()
        })
    }

    pub fn inventory_size(&self, id: i64) -> Option<i64> {
        self.inventory(id, |inv| i64::from(inv.size()))
    }

    pub fn inventory_resize(&self, id: i64, size: i64) -> bool {
        let Some(size) = count_arg(size, "inventory size") else {
            return false;
        };
        self.inventory(id, |inv| inv.resize(size)).is_some()
    }

    pub fn inventory_available(&self, id: i64) -> Option<i64> {
        self.inventory(id, |inv| i64::from(inv.available()))
    }

    pub fn inventory_add(&self, id: i64, quantity: i64, item: &str) -> Option<i64> {
        let quantity = count_arg(quantity, "quantity")?;
        self.inventory(id, |inv| i64::from(inv.add(quantity, item)))
    }

    pub fn inventory_add_all(&self, id: i64, quantity: i64, item: &str) -> Option<i64> {
        let quantity = count_arg(quantity, "quantity")?;
        self.inventory(id, |inv| i64::from(inv.add_all(quantity, item)))
    }

    pub fn inventory_del(&self, id: i64, quantity: i64, item: &str) -> Option<i64> {
        let quantity = count_arg(quantity, "quantity")?;
        self.inventory(id, |inv| i64::from(inv.del(quantity, item)))
    }

    pub fn inventory_del_all(&self, id: i64, quantity: i64, item: &str) -> Option<i64> {
        let quantity = count_arg(quantity, "quantity")?;
        self.inventory(id, |inv| i64::from(inv.del_all(quantity, item)))
    }

    pub fn inventory_move(&self, id: i64, quantity: i64, item: &str, dst: i64) -> Option<i64> {
        self.move_items(id, quantity, item, dst, false)
    }

    pub fn inventory_move_all(&self, id: i64, quantity: i64, item: &str, dst: i64) -> Option<i64> {
        self.move_items(id, quantity, item, dst, true)
    }

    fn move_items(&self, id: i64, quantity: i64, item: &str, dst: i64, all: bool) -> Option<i64> {
        let quantity = count_arg(quantity, "quantity")?;
        let from = InventoryId(id_arg(id, "inventory")?);
        let to = InventoryId(id_arg(dst, "inventory")?);
        let moved = self.server()?.move_items(from, to, quantity, item, all);
        if moved.is_none() {
            warn!(target: "scripting", "Inventory {} or {} doesn't exist", id, dst);
        }
        moved.map(i64::from)
    }

    /* Artifacts */

    pub fn create_artifact(&self, name: &str) -> Option<i64> {
        Some(id_out(self.server()?.new_artifact(name).get()))
    }

    pub fn delete_artifact(&self, id: i64) -> bool {
        let Some(raw) = id_arg(id, "artifact") else {
            return false;
        };
        let deleted = self.server().is_some_and(|s| s.del_artifact(ArtifactId(raw)));
        if !deleted {
            warn!(target: "scripting", "Artifact {} doesn't exist", id);
        }
        deleted
    }

    fn artifact<R>(&self, id: i64, f: impl FnOnce(&mut crate::inventory::Artifact) -> R) -> Option<R> {
        let raw = id_arg(id, "artifact")?;
        let result = self.server()?.with_artifact(ArtifactId(raw), f);
        if result.is_none() {
            warn!(target: "scripting", "Artifact {} doesn't exist", id);
        }
        result
    }

    pub fn artifact_name(&self, id: i64) -> Option<String> {
        self.artifact(id, |a| a.name.clone())
    }

    pub fn artifact_set_name(&self, id: i64, name: &str) -> bool {
        self.artifact(id, |a| a.name = name.to_string()).is_some()
    }

    pub fn artifact_tag(&self, id: i64, key: &str) -> Option<String> {
        self.artifact(id, |a| a.tags.get(key).map(str::to_string))
            .flatten()
    }

    pub fn artifact_set_tag(&self, id: i64, key: &str, value: &str) -> bool {
        self.artifact(id, |a| a.tags.set(key, value)).is_some()
    }

    pub fn artifact_del_tag(&self, id: i64, key: &str) -> bool {
        self.artifact(id, |a| a.tags.remove(key)).unwrap_or(false)
    }
}

fn id_arg(id: i64, what: &str) -> Option<u64> {
    let raw = u64::try_from(id).ok();
    if raw.is_none() {
        warn!(target: "scripting", "Invalid {} id {}", what, id);
    }
    raw
}

fn id_out(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}

fn count_arg(value: i64, what: &str) -> Option<u32> {
    let count = u32::try_from(value).ok();
    if count.is_none() {
        warn!(target: "scripting", "Invalid {} {}", what, value);
    }
    count
}

/// Names and aspects travel as single fields of the client protocol.
fn token_arg(value: &str, what: &str) -> bool {
    let ok = is_token(value);
    if !ok {
        warn!(target: "scripting", "Invalid {} {:?}: must be a single word", what, value);
    }
    ok
}
