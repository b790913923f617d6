//! Coalescing snapshot broadcaster
//!
//! At most one snapshot is pending. Enqueuing overwrites whatever was pending,
//! and flushing sends it unless it equals the snapshot sent last. Command
//! handling enqueues and flushes once at the end of the command; engine
//! callbacks broadcast immediately.

use cadence_common::events::{PlaybackSnapshot, PlayerEvent};
use tokio::sync::mpsc;
use tracing::{debug, trace};

pub struct EventBroadcaster {
    tx: Option<mpsc::UnboundedSender<PlayerEvent>>,
    pending: Option<PlaybackSnapshot>,
    last_sent: Option<PlaybackSnapshot>,
}

impl EventBroadcaster {
    pub fn new(tx: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self { tx: Some(tx), pending: None, last_sent: None }
    }

    /// Store `snapshot` for the next flush, replacing any unsent one
    pub fn enqueue(&mut self, snapshot: PlaybackSnapshot) {
        if self.pending.is_some() {
            trace!("Coalescing pending snapshot");
        }
        self.pending = Some(snapshot);
    }

    /// Send the pending snapshot, if any; returns whether one was sent
    pub fn flush(&mut self) -> bool {
        let Some(snapshot) = self.pending.take() else {
            return false;
        };
        if self.last_sent.as_ref() == Some(&snapshot) {
            trace!("Suppressing duplicate snapshot");
            return false;
        }

        debug!(
            "Broadcasting {} at {}us (index {:?})",
            snapshot.processing_state, snapshot.update_position_us, snapshot.current_index
        );
        self.send(PlayerEvent::PlaybackEvent(snapshot.clone()));
        self.last_sent = Some(snapshot);
        true
    }

    /// Enqueue and flush in one step
    pub fn broadcast_now(&mut self, snapshot: PlaybackSnapshot) -> bool {
        self.enqueue(snapshot);
        self.flush()
    }

    /// Push an out-of-band error event
    pub fn send_error(&mut self, code: i32, message: &str, index: Option<usize>) {
        debug!("Broadcasting error {}: {}", code, message);
        self.send(PlayerEvent::PlaybackError { code, message: message.to_string(), index });
    }

    /// Last snapshot that actually went out
    pub fn last_sent(&self) -> Option<&PlaybackSnapshot> {
        self.last_sent.as_ref()
    }

    /// Flush, then end the stream
    pub fn close(&mut self) {
        self.flush();
        if self.tx.take().is_some() {
            debug!("Event stream closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    fn send(&self, event: PlayerEvent) {
        if let Some(tx) = &self.tx {
            // Fire and forget: a host that stopped listening is not our failure
            if tx.send(event).is_err() {
                trace!("Event receiver gone");
            }
        }
    }
}
