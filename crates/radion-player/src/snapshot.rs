/// Rendezvous channel carrying `PlaybackState` snapshots to the one consumer.
///
/// `send` completes only after the receiver has taken the snapshot, so the
/// consumer observes every state change in the order the controller made
/// them.  An absent consumer therefore stalls the sender; a dropped one makes
/// `send` fail with `SnapshotClosed`.
use radion_proto::protocol::PlaybackState;
use tokio::sync::{mpsc, oneshot};

struct Handoff {
    state: PlaybackState,
    taken: oneshot::Sender<()>,
}

#[derive(Debug, thiserror::Error)]
#[error("snapshot consumer is gone")]
pub struct SnapshotClosed;

#[derive(Clone)]
pub struct SnapshotSender {
    tx: mpsc::Sender<Handoff>,
}

pub struct SnapshotReceiver {
    rx: mpsc::Receiver<Handoff>,
}

pub fn snapshot_channel() -> (SnapshotSender, SnapshotReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (SnapshotSender { tx }, SnapshotReceiver { rx })
}

impl SnapshotSender {
    pub async fn send(&self, state: PlaybackState) -> Result<(), SnapshotClosed> {
        let (taken, taken_rx) = oneshot::channel();
        self.tx
            .send(Handoff { state, taken })
            .await
            .map_err(|_| SnapshotClosed)?;
        taken_rx.await.map_err(|_| SnapshotClosed)
    }
}

impl SnapshotReceiver {
    /// Wait for the next snapshot.  `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<PlaybackState> {
        let handoff = self.rx.recv().await?;
        let _ = handoff.taken.send(());
        Some(handoff.state)
    }

    /// Take a snapshot only if one is already waiting.
    pub fn try_recv(&mut self) -> Option<PlaybackState> {
        let handoff = self.rx.try_recv().ok()?;
        let _ = handoff.taken.send(());
        Some(handoff.state)
    }
}
