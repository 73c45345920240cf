mod console;

use std::path::PathBuf;

use clap::Parser;
use radion_player::engine::{Engine, EngineOptions};
use radion_player::ipc::IpcClient;
use radion_player::player::{Player, PlayerOptions};
use radion_player::snapshot::snapshot_channel;
use radion_player::version::version_string;
use radion_proto::config::Config;
use radion_proto::{platform, stations};
use tracing::{error, info, info_span};

/// Terminal internet radio driven by mpv.
#[derive(Debug, Parser)]
#[command(name = "radion", disable_version_flag = true)]
struct Cli {
    /// A link or a path to a stations.csv file
    #[arg(short = 's', long = "stations")]
    stations: Option<String>,
    /// Enable debug log (file)
    #[arg(short = 'd', long = "debug")]
    debug: bool,
    /// Show the version number and quit
    #[arg(short = 'v', long = "version")]
    version: bool,
    /// Read configuration from this file instead of the default location
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", version_string());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };

    if let Some(log_path) = init_logging(cli.debug || config.log.debug)? {
        eprintln!("radion log: {}", log_path.display());
    }
    info!("radion starting…");

    let source = cli.stations.as_deref().or(config.stations.source.as_deref());
    let stations = stations::load(source, &config.stations).await?;

    let root = info_span!("radion");
    let address = platform::mpv_socket_address();
    let ipc = IpcClient::new(
        address.clone(),
        config.player.ipc_timeout(),
        config.player.response_buffer,
    );

    let mut engine = Engine::new(
        EngineOptions::from_config(&config, address),
        ipc.clone(),
        info_span!(parent: &root, "engine"),
    );
    if let Err(e) = engine.start().await {
        error!("engine: {}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let (snapshot_tx, snapshot_rx) = snapshot_channel();
    let player = Player::new(
        ipc,
        snapshot_tx,
        PlayerOptions::from_config(&config),
        info_span!(parent: &root, "player"),
    );

    let result = console::run(player, stations, snapshot_rx).await;
    engine.quit().await;
    info!("radion exiting");
    result
}

/// File logging, only when debug logging is on.  `RUST_LOG` overrides the
/// default filter.
fn init_logging(debug: bool) -> anyhow::Result<Option<PathBuf>> {
    if !debug {
        return Ok(None);
    }

    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("radion.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,radion=debug,radion_player=debug,radion_proto=debug".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    Ok(Some(log_path))
}
