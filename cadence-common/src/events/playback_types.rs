//! Playback state and snapshot definitions

use serde::{Deserialize, Serialize};

use super::IcyMetadata;

/// Coarse playback lifecycle phase
///
/// `idle → loading → {buffering, ready} → completed`, with `ready ⇄ buffering`
/// cycling and a fall back to `idle` on fatal errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    #[default]
    Idle,
    Loading,
    Buffering,
    Ready,
    Completed,
}

impl ProcessingState {
    /// Ordinal used by hosts that transport the state as an integer
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// True while there is no prepared media to seek in
    pub fn is_unprepared(self) -> bool {
        matches!(self, ProcessingState::Idle | ProcessingState::Loading)
    }
}

impl std::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingState::Idle => write!(f, "idle"),
            ProcessingState::Loading => write!(f, "loading"),
            ProcessingState::Buffering => write!(f, "buffering"),
            ProcessingState::Ready => write!(f, "ready"),
            ProcessingState::Completed => write!(f, "completed"),
        }
    }
}

/// Immutable point-in-time summary of playback state
///
/// Positions and durations are microseconds. `update_time_ms` is the wall
/// clock at which `update_position_us` was sampled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub processing_state: ProcessingState,
    #[serde(rename = "updatePosition")]
    pub update_position_us: u64,
    #[serde(rename = "updateTime")]
    pub update_time_ms: i64,
    /// Never below `update_position_us`
    #[serde(rename = "bufferedPosition")]
    pub buffered_position_us: u64,
    #[serde(rename = "duration")]
    pub duration_us: Option<u64>,
    pub current_index: Option<usize>,
    pub audio_session_id: Option<i32>,
    pub icy_metadata: IcyMetadata,
    pub error_code: Option<i32>,
    pub error_message: Option<String>,
}
