//! Event types pushed from the player to its host
//!
//! The host sees a single stream of [`PlayerEvent`] values. Snapshot events
//! carry the full coalesced playback state; error events precede the snapshot
//! that latches the same error.

mod icy_types;
mod playback_types;

pub use icy_types::{IcyHeaders, IcyInfo, IcyMetadata};
pub use playback_types::{PlaybackSnapshot, ProcessingState};

use serde::{Deserialize, Serialize};

/// Host-facing player event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Latest coalesced playback state
    PlaybackEvent(PlaybackSnapshot),

    /// Engine error or aborted load, reported out-of-band
    PlaybackError {
        /// Numeric error code (engine category or abort code)
        code: i32,
        /// Human readable message from the engine
        message: String,
        /// Item index current when the error occurred
        index: Option<usize>,
    },
}

impl PlayerEvent {
    /// Snapshot payload, if this is a snapshot event
    pub fn snapshot(&self) -> Option<&PlaybackSnapshot> {
        match self {
            PlayerEvent::PlaybackEvent(snapshot) => Some(snapshot),
            PlayerEvent::PlaybackError { .. } => None,
        }
    }
}
