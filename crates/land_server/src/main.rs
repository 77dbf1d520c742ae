//! # land_server
//!
//! Authoritative tile-world server.
//!
//! ## Startup Sequence
//!
//! 1. Build the [`ServerConfig`] from an optional JSON file and CLI flags.
//! 2. Generate the map and initial population.
//! 3. Start the background systems.
//! 4. Accept connections until Ctrl-C, then stop every system and exit.

mod config;
mod connection;
mod wander;
mod world;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use wander::WanderSystem;
use world::World;

#[derive(Parser)]
#[command(name = "land_server", about = "Tile-world server")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, host:port
    #[arg(short, long)]
    listen: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        Ok(match self.listen {
            Some(listen) => config.with_listen(listen),
            None => config,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("land_server=info".parse()?))
        .init();

    let config = Args::parse().into_config()?;
    config.validate()?;

    let world = Arc::new(World::from_config(&config));
    let _wander = WanderSystem::start(&world, config.wander_tick())?;

    let listener = TcpListener::bind(config.listen.as_str())
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    info!(addr = %listener.local_addr()?, "land server listening");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(%e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(connection::serve(Arc::clone(&world), stream));
                }
                Err(e) => warn!(%e, "accept failed"),
            },
        }
    }

    info!(clients = world.client_count(), "shutting down");
    world.scene().stop_systems().await;
    info!("land server shut down");
    Ok(())
}
