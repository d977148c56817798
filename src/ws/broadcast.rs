//! Fan-out of world snapshots to every connected viewer

use tokio::sync::broadcast;

use super::protocol::ServerMsg;

/// Buffered updates per viewer before it starts skipping
const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<ServerMsg>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Push to all current viewers. Having no viewers is not an error.
    pub fn send(&self, msg: ServerMsg) {
        let _ = self.tx.send(msg);
    }

    /// Viewers only see messages sent after they subscribe
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.tx.subscribe()
    }

    pub fn viewer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
