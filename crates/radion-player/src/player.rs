/// Player — the single owner of playback state.
///
/// All operations lock the same `PlayerState`, change it, talk to mpv, and
/// publish a snapshot before releasing the lock, so every snapshot the
/// consumer sees is a fully applied state and arrives in command order.  The
/// metadata poller writes through the same path.
///
/// Engine commands are fire-and-forget: a failed send is logged and the local
/// state still advances.
use std::sync::Arc;
use std::time::Duration;

use radion_proto::config::Config;
use radion_proto::protocol::{
    EngineCommand, PlaybackState, SongTitle, SONG_LOADING, STATUS_STOPPED,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument, Span};

use crate::ipc::IpcClient;
use crate::poller::Poller;
use crate::snapshot::SnapshotSender;

pub const VOLUME_STEP: u8 = 5;
pub const VOLUME_MAX: u8 = 100;

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub initial_volume: u8,
    pub metadata_interval: Duration,
}

impl PlayerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_volume: config.player.initial_volume(),
            metadata_interval: config.player.metadata_interval(),
        }
    }
}

/// What mpv was last told to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStream {
    pub url: String,
    pub station_name: String,
}

struct PlayerState {
    info: PlaybackState,
    /// `Some` exactly while a poller is running for it.
    active: Option<ActiveStream>,
    poller: Option<Poller>,
}

struct Inner {
    ipc: IpcClient,
    snapshots: SnapshotSender,
    opts: PlayerOptions,
    state: Mutex<PlayerState>,
    span: Span,
}

/// Cloneable handle; clones share the same state.
#[derive(Clone)]
pub struct Player {
    inner: Arc<Inner>,
}

impl Player {
    pub fn new(ipc: IpcClient, snapshots: SnapshotSender, opts: PlayerOptions, span: Span) -> Self {
        let volume = snap_volume(opts.initial_volume);
        Self {
            inner: Arc::new(Inner {
                ipc,
                snapshots,
                opts,
                state: Mutex::new(PlayerState {
                    info: PlaybackState::stopped(volume),
                    active: None,
                    poller: None,
                }),
                span,
            }),
        }
    }

    /// Press a station: start it, switch to it, or turn it off when it is
    /// the one already playing.  Identity is the url, so two names sharing a
    /// url count as the same station.
    pub async fn toggle(&self, station_name: &str, url: &str) {
        async {
            let mut st = self.inner.state.lock().await;

            if st.active.is_some() {
                let previous = self.stop_locked(&mut st).await;
                if previous.is_some_and(|p| p.url == url) {
                    return;
                }
            }

            st.info.status = station_name.to_string();
            st.info.song.clear();
            self.publish(&st).await;
            self.load_locked(&mut st, station_name, url).await;
        }
        .instrument(self.inner.span.clone())
        .await
    }

    /// Load `url` in place of whatever is loaded, keeping its station name.
    /// No stop is sent; with nothing loaded the stream has no station name.
    pub async fn load(&self, url: &str) {
        async {
            let mut st = self.inner.state.lock().await;
            let station_name = st
                .active
                .take()
                .map(|active| active.station_name)
                .unwrap_or_default();
            if let Some(poller) = st.poller.take() {
                poller.stop().await;
            }
            self.load_locked(&mut st, &station_name, url).await;
        }
        .instrument(self.inner.span.clone())
        .await
    }

    /// Stop playback.  Safe to call with nothing loaded.
    pub async fn stop(&self) {
        async {
            let mut st = self.inner.state.lock().await;
            self.stop_locked(&mut st).await;
        }
        .instrument(self.inner.span.clone())
        .await
    }

    pub async fn volume_up(&self) {
        self.adjust_volume(VOLUME_STEP as i16)
            .instrument(self.inner.span.clone())
            .await
    }

    pub async fn volume_down(&self) {
        self.adjust_volume(-(VOLUME_STEP as i16))
            .instrument(self.inner.span.clone())
            .await
    }

    /// Show `"artist - title"`, or just `title` when there is no artist.
    pub async fn set_song_title(&self, artist: &str, title: &str) {
        async {
            let mut st = self.inner.state.lock().await;
            self.set_song_title_locked(&mut st, artist, title).await;
        }
        .instrument(self.inner.span.clone())
        .await
    }

    /// Current state, without publishing.
    pub async fn state(&self) -> PlaybackState {
        self.inner.state.lock().await.info.clone()
    }

    pub async fn active_stream(&self) -> Option<ActiveStream> {
        self.inner.state.lock().await.active.clone()
    }

    // ── locked helpers ────────────────────────────────────────────────────────

    async fn stop_locked(&self, st: &mut PlayerState) -> Option<ActiveStream> {
        match &st.active {
            Some(active) => info!("player: stopping {}", active.url),
            None => debug!("player: stop with nothing loaded"),
        }
        self.inner.ipc.send(&EngineCommand::Stop).await;
        st.info.status = STATUS_STOPPED.to_string();
        st.info.song.clear();
        self.publish(st).await;

        if let Some(poller) = st.poller.take() {
            poller.stop().await;
        }
        st.active.take()
    }

    async fn load_locked(&self, st: &mut PlayerState, station_name: &str, url: &str) {
        self.set_song_title_locked(st, "", SONG_LOADING).await;

        info!("player: loading {}", url);
        self.inner
            .ipc
            .send(&EngineCommand::LoadFile(url.to_string()))
            .await;
        st.active = Some(ActiveStream {
            url: url.to_string(),
            station_name: station_name.to_string(),
        });

        if let Some(stale) = st.poller.take() {
            stale.stop().await;
        }
        st.poller = Some(Poller::spawn(
            self.clone(),
            self.inner.ipc.clone(),
            self.inner.opts.metadata_interval,
            self.inner.span.clone(),
        ));
    }

    async fn adjust_volume(&self, delta: i16) {
        let mut st = self.inner.state.lock().await;
        let current = st.info.volume;
        let next = (current as i16 + delta).clamp(0, VOLUME_MAX as i16) as u8;
        if next == current {
            debug!("player: volume already at {}", current);
            return;
        }

        info!("player: setting volume {}", next);
        self.inner.ipc.send(&EngineCommand::SetVolume(next)).await;
        st.info.volume = next;
        self.publish(&st).await;
    }

    async fn set_song_title_locked(&self, st: &mut PlayerState, artist: &str, title: &str) {
        st.info.song = compose_song(artist, title);
        self.publish(st).await;
    }

    /// Called by the poller.  Gives up if `cancel` fires while waiting for
    /// the lock; an unchanged title is not republished.
    pub(crate) async fn apply_polled_title(
        &self,
        cancel: &CancellationToken,
        song: SongTitle,
    ) -> bool {
        let mut st = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            st = self.inner.state.lock() => st,
        };
        let shown = compose_song(&song.artist, &song.title);
        if st.info.song != shown {
            debug!("player: now playing {:?}", shown);
            st.info.song = shown;
            self.publish(&st).await;
        }
        true
    }

    async fn publish(&self, st: &PlayerState) {
        if let Err(e) = self.inner.snapshots.send(st.info.clone()).await {
            debug!("player: {}", e);
        }
    }
}

/// Nearest volume step within range, so stepping up then down is symmetric.
pub fn snap_volume(volume: u8) -> u8 {
    let snapped = (volume.min(VOLUME_MAX) as u16 + VOLUME_STEP as u16 / 2) / VOLUME_STEP as u16
        * VOLUME_STEP as u16;
    snapped.min(VOLUME_MAX as u16) as u8
}

pub fn compose_song(artist: &str, title: &str) -> String {
    if artist.is_empty() {
        title.to_string()
    } else {
        format!("{} - {}", artist, title)
    }
}
