//! # land_client
//!
//! Terminal client for the tile world.
//!
//! ## Startup Sequence
//!
//! 1. Build the [`ClientConfig`] from an optional JSON file and CLI flags.
//! 2. Initialise logging, to a file if one is configured.
//! 3. Connect to the server and start the session handshake.
//! 4. Spawn the stdin reader and run the game loop until `/quit`, end of
//!    input, or Ctrl-C.

mod config;
mod input;
mod mirror;
mod render;
mod session;
mod tick;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use land_net::{ClientPacket, ServerPacket, Transport};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::ClientConfig;
use render::TextRenderer;
use session::Session;
use tick::Game;

/// Commands buffered between the stdin reader and the game loop.
const COMMAND_QUEUE: usize = 64;

#[derive(Parser)]
#[command(name = "land_client", about = "Tile-world client")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server address, host:port
    #[arg(short, long)]
    server: Option<String>,

    /// Login name
    #[arg(short, long)]
    username: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(short, long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::default(),
        };
        if let Some(server) = self.server {
            config = config.with_server(server);
        }
        if let Some(username) = self.username {
            config = config.with_username(username);
        }
        if let Some(path) = self.log_file {
            config = config.with_log_file(path);
        }
        Ok(config)
    }
}

fn init_logging(config: &ClientConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("land_client=info".parse()?);
    match &config.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config()?;
    init_logging(&config)?;
    config.validate()?;

    info!(server = config.server, username = config.username, "land client starting");

    let (sender, receiver) = Transport::<ServerPacket, ClientPacket>::connect(config.server.as_str())
        .await
        .with_context(|| format!("connecting to {}", config.server))?;

    let mut session = Session::new(&config, sender);
    session.start();

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
    tokio::spawn(input::read_commands(tokio::io::stdin(), cmd_tx));

    let game = Game::new(
        session,
        TextRenderer::new(std::io::stdout()),
        config.tick_period(),
        config.max_delta(),
    );
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(%e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let session = game.run(receiver, cmd_rx, shutdown).await;

    info!(state = ?session.state(), "land client shut down");
    Ok(())
}
