use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};

use tellus_scripting_host::create_engine_from_config;
use tellus_world::config::{ScriptingConfig, ServerConfig};
use tellus_world::{PlayerId, Server};

const INIT: &str = r#"
register_aspect("grass", 1, true);
register_aspect("water", 2, false);
new_zone("meadow", "Sunny Meadow", 3, 2, "grass");
place_set_aspect("meadow", 2, 0, "water");
add_action("north", "player_move(player, 0, -1);");
add_action("east", "player_move(player, 1, 0);");
add_action("say", `zone_event(player_get_zone(player), player_get_name(player) + ": " + arg);`);
"#;

const SPAWN: &str = r#"
player_set_name(player, "wanderer");
player_spawn(player, "meadow", 1, 1);
"#;

struct World {
    server: Server,
    scripts: TempDir,
}

fn world(spawn: &str) -> World {
    world_with(spawn, ScriptingConfig::default())
}

fn world_with(spawn: &str, scripting: ScriptingConfig) -> World {
    let scripts = tempfile::tempdir().unwrap();
    fs::write(scripts.path().join("init.rhai"), INIT).unwrap();
    fs::write(scripts.path().join("spawn.rhai"), spawn).unwrap();

    let scripting = ScriptingConfig {
        script_dir: Some(scripts.path().to_path_buf()),
        ..scripting
    };
    let server = Server::builder()
        .with_config(ServerConfig {
            tick_interval_ms: 3_600_000,
            ..ServerConfig::default()
        })
        .with_engine(create_engine_from_config(&scripting))
        .build()
        .unwrap();
    server.run_file(&scripting.init_script_path()).unwrap();
    World { server, scripts }
}

fn run(server: &Server, dir: &Path, source: &str) {
    let path = dir.join("check.rhai");
    fs::write(&path, source).unwrap();
    server.run_file(&path).unwrap();
}

struct Client {
    id: PlayerId,
    lines: Lines<BufReader<DuplexStream>>,
    writer: DuplexStream,
}

impl Client {
    fn connect(server: &Server) -> Client {
        let (client_in, server_out) = tokio::io::duplex(64 * 1024);
        let (client_out, server_in) = tokio::io::duplex(64 * 1024);
        let id = server.admit(server_in, server_out, None).unwrap();
        Client {
            id,
            lines: BufReader::new(client_in).lines(),
            writer: client_out,
        }
    }

    async fn expect(&mut self, line: &str) {
        let got = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap();
        assert_eq!(got.as_deref(), Some(line));
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }
}

#[tokio::test]
async fn test_init_and_spawn_scripts_build_the_world() {
    let w = world(SPAWN);
    let mut client = Client::connect(&w.server);
    let id = client.id;

    client.expect("floor 3 2 grass grass water grass grass grass").await;
    client.expect(&format!("player {id} 1 1 none wanderer")).await;

    let zone = w.server.get_zone("meadow").unwrap();
    assert_eq!(zone.name(), "Sunny Meadow");
    assert_eq!(w.server.aspects().code(&"water".into()), 2);
}

#[tokio::test]
async fn test_actions_move_and_talk() {
    let w = world(SPAWN);
    let mut client = Client::connect(&w.server);
    let id = client.id;
    client.expect("floor 3 2 grass grass water grass grass grass").await;
    client.expect(&format!("player {id} 1 1 none wanderer")).await;

    client.send("north").await;
    client.expect(&format!("player {id} 1 0 none wanderer")).await;

    // water is not passable
    client.send("east").await;
    client.send("say hello there").await;
    client.expect("message wanderer: hello there").await;

    let player = w.server.get_player(id).unwrap();
    assert_eq!(player.position(), (1, 0));
}

#[tokio::test]
async fn test_gauge_empty_edge_runs_script() {
    let spawn = format!(
        "{SPAWN}\n{}",
        r#"
        new_gauge(player, "hp", 5, 10, "heart", "skull");
        gauge_set_onempty(player, "hp", `player_message(player, "you faint");`);
        add_action("hurt", `gauge_decrease(player, "hp", parse_int(arg));`);
        "#
    );
    let w = world(&spawn);
    let mut client = Client::connect(&w.server);
    let id = client.id;
    client.expect("floor 3 2 grass grass water grass grass grass").await;
    client.expect(&format!("player {id} 1 1 none wanderer")).await;
    client.expect("gauge hp 5 10 heart skull").await;

    client.send("hurt 2").await;
    client.expect("gauge hp 3 10 heart skull").await;
    client.send("hurt 7").await;
    client.expect("gauge hp 0 10 heart skull").await;
    client.expect("message you faint").await;
}

#[tokio::test]
async fn test_timers_fire_scripts() {
    let w = world(SPAWN);
    let mut client = Client::connect(&w.server);
    client.expect("floor 3 2 grass grass water grass grass grass").await;
    client
        .expect(&format!("player {} 1 1 none wanderer", client.id))
        .await;

    run(
        &w.server,
        w.scripts.path(),
        r#"
        let t = create_timer(2, `zone_event("meadow", "the bell tolls");`);
        if timer_get_remaining(t) != 2 { throw "remaining"; }
        "#,
    );
    assert_eq!(w.server.timer_count(), 1);
    w.server.tick_timers();
    w.server.tick_timers();
    client.expect("message the bell tolls").await;
    assert_eq!(w.server.timer_count(), 0);
}

#[tokio::test]
async fn test_inventories_and_lookups_from_scripts() {
    let w = world(SPAWN);
    run(
        &w.server,
        w.scripts.path(),
        r#"
        let bag = create_inventory(10);
        let pouch = create_inventory(3);
        if inventory_add(bag, 7, "gem") != 7 { throw "add"; }
        if inventory_add_all(bag, 4, "coin") != 0 { throw "add_all"; }
        if inventory_move(bag, 5, "gem", pouch) != 3 { throw "move"; }
        let all = inventory_get_all(bag);
        if all["gem"] != 4 { throw "get_all"; }
        if inventory_move_all(bag, 4, "gem", pouch) != 0 { throw "move_all"; }
        if inventory_available(pouch) != 0 { throw "available"; }

        let sword = create_artifact("sword");
        artifact_set_tag(sword, "sharp", "yes");
        if artifact_get_tag(sword, "sharp") != "yes" { throw "tag"; }

        let r = c_rand(6);
        if r < 1 || r > 6 { throw "c_rand"; }
        if c_rand(0) != () { throw "c_rand(0)"; }

        if assert_player(99) { throw "assert_player"; }
        if player_get_name(99) != () { throw "player_get_name"; }
        if assert_zone("nowhere") { throw "assert_zone"; }
        if !assert_zone("meadow") { throw "meadow"; }
        "#,
    );
}

#[tokio::test]
async fn test_failing_script_reports_error() {
    let w = world(SPAWN);
    let path = w.scripts.path().join("broken.rhai");
    fs::write(&path, r#"throw "nope";"#).unwrap();
    assert!(w.server.run_file(&path).is_err());
    assert!(w.server.run_file(&w.scripts.path().join("missing.rhai")).is_err());
}

#[tokio::test]
async fn test_gauge_edges_cannot_recurse_forever() {
    let spawn = format!(
        "{SPAWN}\n{}",
        r#"
        new_gauge(player, "flux", 1, 2, "bright", "dim");
        gauge_set_onempty(player, "flux", `gauge_set_val(player, "flux", 2);`);
        gauge_set_onfull(player, "flux", `gauge_set_val(player, "flux", 0);`);
        "#
    );
    let w = world_with(
        &spawn,
        ScriptingConfig {
            max_nesting: 4,
            ..ScriptingConfig::default()
        },
    );
    let mut client = Client::connect(&w.server);
    let id = client.id;
    client.expect("floor 3 2 grass grass water grass grass grass").await;
    client.expect(&format!("player {id} 1 1 none wanderer")).await;
    client.expect("gauge flux 1 2 bright dim").await;

    run(
        &w.server,
        w.scripts.path(),
        &format!(r#"gauge_set_val({id}, "flux", 0);"#),
    );

    let player = w.server.get_player(id).unwrap();
    assert_eq!(player.gauge("flux").unwrap().val(), 2);
    assert!(player.is_alive());
    client.expect("gauge flux 0 2 bright dim").await;
    client.expect("gauge flux 2 2 bright dim").await;
    client.expect("gauge flux 0 2 bright dim").await;
    client.expect("gauge flux 2 2 bright dim").await;
}
