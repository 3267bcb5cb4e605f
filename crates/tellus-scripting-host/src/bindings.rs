//! Script-callable functions.
//!
//! Every function forwards to a [`Boundary`] method. Missing entities and bad
//! arguments are logged by the boundary and come back as `()` or `false`;
//! calling a function with the wrong argument types is a Rhai runtime error.

use rand::Rng;
use rhai::{Dynamic, Engine, ImmutableString, Map, INT};
use tracing::warn;

use tellus_world::Boundary;

type Str = ImmutableString;

/// Conversion of boundary results into script values. `None` becomes `()`.
pub trait IntoDynamic {
    fn into_dynamic(self) -> Dynamic;
}

macro_rules! plain_into_dynamic {
    ($($ty:ty),*) => {
        $(
            impl IntoDynamic for $ty {
                fn into_dynamic(self) -> Dynamic {
                    Dynamic::from(self)
                }
            }
        )*
    };
}

plain_into_dynamic!((), bool, INT, String);

macro_rules! optional_into_dynamic {
    ($($ty:ty),*) => {
        $(
            impl IntoDynamic for Option<$ty> {
                fn into_dynamic(self) -> Dynamic {
                    self.map(Dynamic::from).unwrap_or(Dynamic::UNIT)
                }
            }
        )*
    };
}

optional_into_dynamic!(bool, INT, String);

impl IntoDynamic for Option<Vec<(String, INT)>> {
    fn into_dynamic(self) -> Dynamic {
        match self {
            Some(items) => {
                let map: Map = items
                    .into_iter()
                    .map(|(item, quantity)| (item.into(), Dynamic::from(quantity)))
                    .collect();
                Dynamic::from_map(map)
            }
            None => Dynamic::UNIT,
        }
    }
}

/// Register `name(args..)` as a call to a boundary method. Arguments are
/// bound by name in the closure and may be reshaped in the call, e.g.
/// `&zone` to pass a string or `None` for an omitted optional.
macro_rules! expose {
    ($engine:ident, $api:ident; $($name:literal ($($arg:ident : $ty:ty),*) => $method:ident($($call:expr),*);)*) => {
        $({
            let api = $api.clone();
            $engine.register_fn($name, move |$($arg: $ty),*| -> Dynamic {
                api.$method($($call),*).into_dynamic()
            });
        })*
    };
}

/// Register the whole script surface on `engine`.
pub fn register(engine: &mut Engine, api: Boundary) {
    expose!(engine, api;
        // logging and server
        "info"(m: Str) => info(&m);
        "warning"(m: Str) => warning(&m);
        "fatal"(m: Str) => fatal(&m);
        "setverbose"(v: bool) => set_verbose(v);
        "isverbose"() => is_verbose();
        "halt"() => halt();
        "open"(port: INT) => open(port);
        "close"() => close();
        "is_open"() => is_open();
        "get_port"() => port();
        "register_aspect"(aspect: Str, code: INT) => register_aspect(&aspect, code, None);
        "register_aspect"(aspect: Str, code: INT, passable: bool) => register_aspect(&aspect, code, Some(passable));
        "aspect_code"(aspect: Str) => aspect_code(&aspect);

        // actions
        "add_action"(trigger: Str, script: Str) => add_action(&trigger, &script);
        "get_action"(trigger: Str) => get_action(&trigger);
        "delete_action"(trigger: Str) => delete_action(&trigger);

        // timers
        "create_timer"(ticks: INT, script: Str) => create_timer(ticks, &script);
        "delete_timer"(id: INT) => delete_timer(id);
        "timer_get_remaining"(id: INT) => timer_remaining(id);
        "timer_set_remaining"(id: INT, remaining: INT) => timer_set_remaining(id, remaining);
        "timer_trigger_now"(id: INT) => timer_trigger_now(id);

        // zones
        "new_zone"(id: Str, name: Str, w: INT, h: INT, aspect: Str) => new_zone(&id, &name, w, h, &aspect);
        "delete_zone"(id: Str) => delete_zone(&id);
        "assert_zone"(id: Str) => zone_exists(&id);
        "zone_get_name"(id: Str) => zone_name(&id);
        "zone_set_name"(id: Str, name: Str) => zone_set_name(&id, &name);
        "zone_get_width"(id: Str) => zone_width(&id);
        "zone_get_height"(id: Str) => zone_height(&id);
        "zone_event"(id: Str, message: Str) => zone_event(&id, &message);

        // places
        "place_get_aspect"(z: Str, x: INT, y: INT) => place_aspect(&z, x, y);
        "place_set_aspect"(z: Str, x: INT, y: INT, aspect: Str) => place_set_aspect(&z, x, y, &aspect);
        "place_is_passable"(z: Str, x: INT, y: INT) => place_is_passable(&z, x, y);
        "place_set_passable"(z: Str, x: INT, y: INT) => place_set_passable(&z, x, y, true);
        "place_set_not_passable"(z: Str, x: INT, y: INT) => place_set_passable(&z, x, y, false);
        "place_get_landon"(z: Str, x: INT, y: INT) => place_on_walk(&z, x, y);
        "place_set_landon"(z: Str, x: INT, y: INT, script: Str) => place_set_on_walk(&z, x, y, &script);
        "place_reset_landon"(z: Str, x: INT, y: INT) => place_reset_on_walk(&z, x, y);
        "place_get_tag"(z: Str, x: INT, y: INT, tag: Str) => place_tag(&z, x, y, &tag);
        "place_set_tag"(z: Str, x: INT, y: INT, tag: Str, value: Str) => place_set_tag(&z, x, y, &tag, &value);
        "place_del_tag"(z: Str, x: INT, y: INT, tag: Str) => place_del_tag(&z, x, y, &tag);

        // players
        "assert_player"(p: INT) => player_exists(p);
        "delete_player"(p: INT) => delete_player(p);
        "player_spawn"(p: INT, z: Str, x: INT, y: INT) => player_spawn(p, &z, x, y);
        "player_change_zone"(p: INT, z: Str, x: INT, y: INT) => player_change_zone(p, &z, x, y);
        "player_get_name"(p: INT) => player_name(p);
        "player_set_name"(p: INT, name: Str) => player_set_name(p, &name);
        "player_get_aspect"(p: INT) => player_aspect(p);
        "player_set_aspect"(p: INT, aspect: Str) => player_set_aspect(p, &aspect);
        "player_get_zone"(p: INT) => player_zone(p);
        "player_get_x"(p: INT) => player_x(p);
        "player_get_y"(p: INT) => player_y(p);
        "player_set_xy"(p: INT, x: INT, y: INT) => player_set_xy(p, x, y);
        "player_move"(p: INT, dx: INT, dy: INT) => player_move(p, dx, dy);
        "player_get_on_death"(p: INT) => player_on_death(p);
        "player_set_on_death"(p: INT, script: Str) => player_set_on_death(p, &script);
        "player_reset_on_death"(p: INT) => player_reset_on_death(p);
        "player_is_ghost"(p: INT) => player_is_ghost(p);
        "player_set_ghost"(p: INT, ghost: bool) => player_set_ghost(p, ghost);
        "player_get_tag"(p: INT, tag: Str) => player_tag(p, &tag);
        "player_set_tag"(p: INT, tag: Str, value: Str) => player_set_tag(p, &tag, &value);
        "player_del_tag"(p: INT, tag: Str) => player_del_tag(p, &tag);
        "player_message"(p: INT, text: Str) => player_message(p, &text);
        "player_hint"(p: INT, aspect: Str, text: Str) => player_hint(p, &aspect, &text);
        "player_follow"(p: INT, target: INT) => player_follow(p, target);
        "player_update_inventory"(p: INT, item: Str, aspect: Str) => player_update_inventory(p, &item, &aspect);
        "player_update_no_inventory"(p: INT, item: Str) => player_update_no_inventory(p, &item);
        "player_add_pickup_list"(p: INT, item: Str, aspect: Str) => player_add_pickup(p, &item, &aspect);
        "player_rem_pickup_list"(p: INT, item: Str) => player_remove_pickup(p, &item);

        // gauges
        "new_gauge"(p: INT, g: Str, val: INT, max: INT, full: Str, empty: Str) => new_gauge(p, &g, val, max, &full, &empty, None);
        "new_gauge"(p: INT, g: Str, val: INT, max: INT, full: Str, empty: Str, visible: bool) => new_gauge(p, &g, val, max, &full, &empty, Some(visible));
        "assert_gauge"(p: INT, g: Str) => gauge_exists(p, &g);
        "delete_gauge"(p: INT, g: Str) => delete_gauge(p, &g);
        "gauge_set_name"(p: INT, g: Str, name: Str) => gauge_set_name(p, &g, &name);
        "gauge_get_val"(p: INT, g: Str) => gauge_val(p, &g);
        "gauge_set_val"(p: INT, g: Str, val: INT) => gauge_set_val(p, &g, val);
        "gauge_increase"(p: INT, g: Str, by: INT) => gauge_increase(p, &g, by);
        "gauge_decrease"(p: INT, g: Str, by: INT) => gauge_decrease(p, &g, by);
        "gauge_get_max"(p: INT, g: Str) => gauge_max(p, &g);
        "gauge_set_max"(p: INT, g: Str, max: INT) => gauge_set_max(p, &g, max);
        "gauge_get_onfull"(p: INT, g: Str) => gauge_on_full(p, &g);
        "gauge_set_onfull"(p: INT, g: Str, script: Str) => gauge_set_on_full(p, &g, Some(script.as_str()));
        "gauge_reset_onfull"(p: INT, g: Str) => gauge_set_on_full(p, &g, None);
        "gauge_get_onempty"(p: INT, g: Str) => gauge_on_empty(p, &g);
        "gauge_set_onempty"(p: INT, g: Str, script: Str) => gauge_set_on_empty(p, &g, Some(script.as_str()));
        "gauge_reset_onempty"(p: INT, g: Str) => gauge_set_on_empty(p, &g, None);
        "gauge_is_visible"(p: INT, g: Str) => gauge_is_visible(p, &g);
        "gauge_set_visible"(p: INT, g: Str) => gauge_set_visible(p, &g, true);
        "gauge_set_invisible"(p: INT, g: Str) => gauge_set_visible(p, &g, false);

        // inventories
        "create_inventory"(size: INT) => create_inventory(size);
        "delete_inventory"(i: INT) => delete_inventory(i);
        "inventory_get"(i: INT, item: Str) => inventory_get(i, &item);
        "inventory_get_all"(i: INT) => inventory_get_all(i);
        "inventory_size"(i: INT) => inventory_size(i);
        "inventory_resize"(i: INT, size: INT) => inventory_resize(i, size);
        "inventory_available"(i: INT) => inventory_available(i);
        "inventory_add"(i: INT, q: INT, item: Str) => inventory_add(i, q, &item);
        "inventory_add_all"(i: INT, q: INT, item: Str) => inventory_add_all(i, q, &item);
        "inventory_del"(i: INT, q: INT, item: Str) => inventory_del(i, q, &item);
        "inventory_del_all"(i: INT, q: INT, item: Str) => inventory_del_all(i, q, &item);
        "inventory_move"(i: INT, q: INT, item: Str, dst: INT) => inventory_move(i, q, &item, dst);
        "inventory_move_all"(i: INT, q: INT, item: Str, dst: INT) => inventory_move_all(i, q, &item, dst);

        // artifacts
        "create_artifact"(name: Str) => create_artifact(&name);
        "delete_artifact"(a: INT) => delete_artifact(a);
        "artifact_get_name"(a: INT) => artifact_name(a);
        "artifact_set_name"(a: INT, name: Str) => artifact_set_name(a, &name);
        "artifact_get_tag"(a: INT, tag: Str) => artifact_tag(a, &tag);
        "artifact_set_tag"(a: INT, tag: Str, value: Str) => artifact_set_tag(a, &tag, &value);
        "artifact_del_tag"(a: INT, tag: Str) => artifact_del_tag(a, &tag);
    );

    engine.register_fn("c_rand", c_rand);
}

/// Uniform integer in `[1, max]`, or `()` when `max < 1`.
fn c_rand(max: INT) -> Dynamic {
    if max < 1 {
        warn!(target: "scripting", "c_rand({}): max must be at least 1", max);
        return Dynamic::UNIT;
    }
    Dynamic::from(rand::thread_rng().gen_range(1..=max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_rand_bounds() {
        for _ in 0..200 {
            let v = c_rand(3).as_int().unwrap();
            assert!((1..=3).contains(&v));
        }
        assert_eq!(c_rand(1).as_int().unwrap(), 1);
        assert!(c_rand(0).is_unit());
    }

    #[test]
    fn test_none_is_unit() {
        assert!(None::<INT>.into_dynamic().is_unit());
        assert_eq!(Some(4 as INT).into_dynamic().as_int().unwrap(), 4);
        let all = Some(vec![("gem".to_string(), 2 as INT)]).into_dynamic();
        assert!(all.is_map());
    }
}
