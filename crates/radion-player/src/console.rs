/// Line-oriented front end: prints snapshots as they arrive and turns input
/// lines into player operations.
use std::future::Future;
use std::io::{BufRead, BufReader, Read};

use radion_proto::protocol::PlaybackState;
use radion_proto::stations::StationList;
use radion_player::player::Player;
use radion_player::snapshot::SnapshotReceiver;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Zero-based station index.
    Toggle(usize),
    VolumeUp,
    VolumeDown,
    Stop,
    List,
    Quit,
    Help,
}

impl ConsoleCommand {
    /// Station numbers are typed 1-based.
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "+" | "=" => Self::VolumeUp,
            "-" | "_" => Self::VolumeDown,
            "s" => Self::Stop,
            "l" => Self::List,
            "q" => Self::Quit,
            other => match other.parse::<usize>() {
                Ok(n) if n > 0 => Self::Toggle(n - 1),
                _ => Self::Help,
            },
        }
    }
}

const HELP: &str = "<n> play/stop station n · + / - volume · s stop · l list · q quit";

pub async fn run(
    player: Player,
    stations: StationList,
    snapshots: SnapshotReceiver,
) -> anyhow::Result<()> {
    let lines = spawn_line_reader(std::io::stdin())?;
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("console: cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    run_with(player, stations, snapshots, lines, interrupt).await
}

/// Reads lines on a plain thread; a blocking stdin read would otherwise hold
/// up runtime shutdown.  The channel closes at end of input.
pub fn spawn_line_reader<R>(input: R) -> std::io::Result<mpsc::Receiver<String>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("radion-stdin".into())
        .spawn(move || {
            for line in BufReader::new(input).lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("console: reading input failed: {}", e);
                        break;
                    }
                }
            }
            debug!("console: input closed");
        })?;
    Ok(rx)
}

async fn run_with(
    player: Player,
    stations: StationList,
    snapshots: SnapshotReceiver,
    mut lines: mpsc::Receiver<String>,
    interrupt: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    print_stations(&stations);
    println!("{}", HELP);

    let renderer = tokio::spawn(render(snapshots));
    // Polled across iterations, so an interrupt during a command still counts.
    tokio::pin!(interrupt);

    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = &mut interrupt => {
                info!("console: interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match ConsoleCommand::parse(&line) {
            ConsoleCommand::Toggle(idx) => match stations.get(idx) {
                Some(station) => player.toggle(&station.name, &station.url).await,
                None => println!("no station {}", idx + 1),
            },
            ConsoleCommand::VolumeUp => player.volume_up().await,
            ConsoleCommand::VolumeDown => player.volume_down().await,
            ConsoleCommand::Stop => player.stop().await,
            ConsoleCommand::List => print_stations(&stations),
            ConsoleCommand::Quit => break,
            ConsoleCommand::Help => println!("{}", HELP),
        }
    }

    if player.active_stream().await.is_some() {
        player.stop().await;
    }
    renderer.abort();
    Ok(())
}

fn print_stations(stations: &StationList) {
    for (i, station) in stations.iter().enumerate() {
        println!("{:>3}  {}", i + 1, station.name);
    }
}

async fn render(mut snapshots: SnapshotReceiver) {
    while let Some(state) = snapshots.recv().await {
        println!("{}", status_line(&state, chrono::Local::now()));
    }
}

pub fn status_line(state: &PlaybackState, now: chrono::DateTime<chrono::Local>) -> String {
    let marker = if state.is_stopped() { "■" } else { "▶" };
    let mut line = format!(
        "{} {} {}  vol {}%",
        now.format("%H:%M:%S"),
        marker,
        state.status,
        state.volume
    );
    if !state.song.is_empty() {
        line.push_str(" | ");
        line.push_str(&state.song);
    }
    line
}
