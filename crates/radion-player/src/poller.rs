/// Metadata poller — one per loaded stream.
///
/// Every tick it asks mpv for `metadata`, picks a display title, and hands it
/// to the `Player`, which applies it under the same lock as user commands.
/// Transport and decode failures are logged and the tick is skipped.
/// Cancellation wins over a pending tick, an in-flight query, and a wait on
/// the player lock.
use std::time::Duration;

use radion_proto::protocol::{EngineCommand, MetadataReply, SongTitle};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument, Span};

use crate::ipc::IpcClient;
use crate::player::Player;

pub(crate) struct Poller {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Poller {
    pub(crate) fn spawn(player: Player, ipc: IpcClient, interval: Duration, span: Span) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(player, ipc, interval, cancel.clone()).instrument(span));
        Self { cancel, task }
    }

    /// Signal the task and wait until it has actually exited.
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("poller: task ended abnormally: {}", e);
        }
    }
}

async fn run(player: Player, ipc: IpcClient, interval: Duration, cancel: CancellationToken) {
    debug!("poller: started");
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let song = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            song = fetch_song_title(&ipc) => song,
        };

        if let Some(song) = song {
            if !player.apply_polled_title(&cancel, song).await {
                break;
            }
        }
    }
    debug!("poller: stopped");
}

pub(crate) async fn fetch_song_title(ipc: &IpcClient) -> Option<SongTitle> {
    let raw = match ipc.query(&EngineCommand::GetMetadata).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("poller: metadata query failed: {}", e);
            return None;
        }
    };
    let reply = match MetadataReply::decode(&raw) {
        Ok(reply) => reply,
        Err(e) => {
            warn!(
                "poller: bad metadata reply {:?}: {}",
                String::from_utf8_lossy(&raw),
                e
            );
            return None;
        }
    };
    let song = reply.song_title();
    if song.is_none() {
        debug!(
            "poller: no title in metadata (error={:?})",
            reply.error.as_deref().unwrap_or("none")
        );
    }
    song
}
