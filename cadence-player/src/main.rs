//! Cadence Player (cadence-player) - Main entry point
//!
//! Runs one player over stdin/stdout: newline-delimited JSON requests in,
//! replies and playback events out. Logs go to stderr. The engine is the
//! control-path simulator, so the binary exercises the full command and
//! event surface without an audio device.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use cadence_player::api;
use cadence_player::config::{ConfigOverrides, PlayerConfig};
use cadence_player::engine::{SimulatedEffects, SimulatedEngine};
use cadence_player::start_player;

/// Audio session id reported by the simulated engine
const SIMULATED_SESSION_ID: i32 = 1;

/// Command-line arguments for cadence-player
#[derive(Parser, Debug)]
#[command(name = "cadence-player")]
#[command(about = "Playback controller driven over JSON lines")]
#[command(version)]
struct Args {
    /// Config file (overrides CADENCE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CADENCE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Player id used in log spans (random if omitted)
    #[arg(long)]
    player_id: Option<String>,

    /// Fixed shuffle seed
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.apply_overrides(ConfigOverrides { log_level: args.log_level, shuffle_seed: args.seed });

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cadence_player={0},cadence_common={0}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let player_id = args.player_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    info!("Starting cadence player {}", player_id);

    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    let engine = SimulatedEngine::autonomous(Some(SIMULATED_SESSION_ID), engine_tx);
    let player = start_player(
        Box::new(engine),
        engine_rx,
        Box::new(SimulatedEffects::new()),
        config.controller_options(),
        player_id,
    );

    api::serve(player.handle, player.events, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("Transport error")?;

    player.task.await.context("Player task failed")?;
    info!("Player shutdown complete");
    Ok(())
}
