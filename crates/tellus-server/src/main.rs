use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use tellus_scripting_host::create_engine_from_config;
use tellus_world::config::{ConfigLoadError, TellusConfig};
use tellus_world::Server;

mod logging;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enables debug logging (twice for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Config file to use instead of the platform default
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding the init and spawn scripts
    #[arg(short, long)]
    script_dir: Option<PathBuf>,

    /// Also write logs to a file in the log directory
    #[arg(long)]
    log_file: bool,
}

impl Cli {
    fn apply(&self, config: &mut TellusConfig) {
        if let Some(port) = self.port {
            config.server.port = Some(port);
        }
        if let Some(dir) = &self.script_dir {
            config.scripting.script_dir = Some(dir.clone());
        }
        if self.log_file {
            config.logging.file = true;
        }
    }
}

/// An explicitly named config must exist; a missing default config means
/// running with defaults.
fn load_config(path: Option<&Path>) -> Result<TellusConfig, ConfigLoadError> {
    match path {
        Some(path) => TellusConfig::load_from(path),
        None => match TellusConfig::load() {
            Err(ConfigLoadError::NotFound(_)) => Ok(TellusConfig::default()),
            other => other,
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    cli.apply(&mut config);

    let _guard = logging::init_logging("tellus", &config.logging, cli.debug)
        .context("Failed to initialize logging")?;

    info!("Starting tellus server...");
    info!("Scripts in {}", config.scripting.script_dir().display());

    let server = Server::builder()
        .with_config(config.server.clone())
        .with_engine(create_engine_from_config(&config.scripting))
        .build()?;

    let init = config.scripting.init_script_path();
    server
        .run_file(&init)
        .with_context(|| format!("Init script {} failed", init.display()))?;

    if server.is_terminated() {
        info!("Halted during startup");
        return Ok(());
    }

    if let Some(port) = config.server.port {
        if !(server.is_open() && server.port() == port) {
            server.open(port)?;
        }
    }
    if server.is_open() {
        info!("Listening on port {}", server.port());
    } else {
        warn!("Not listening on any port; set one in the config or call open() from the init script");
    }

    let waiter = server.clone();
    let mut halted = tokio::task::spawn_blocking(move || waiter.wait_for_termination());

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Unable to listen for ctrl-c: {}", e);
            }
            info!("Interrupted, halting");
            server.halt();
            halted.await?;
        }
        result = &mut halted => result?,
    }

    info!("Server stopped");
    Ok(())
}
