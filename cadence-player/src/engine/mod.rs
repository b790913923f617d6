//! Boundary to the audio rendering engine
//!
//! The engine (decode, buffer, mix, output) is a black box. The controller
//! drives it through [`AudioEngine`] and learns about its progress only
//! through [`EngineEvent`] callbacks, which must be marshaled onto the
//! controller's task before they touch any state.

pub mod simulated;

use cadence_common::events::{IcyHeaders, IcyInfo};
use serde::{Deserialize, Serialize};

use crate::source::{MediaSource, ShuffleOrder};

pub use simulated::{SimulatedEffects, SimulatedEngine};

/// Engine-level playback state (distinct from the host-facing processing state)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Why the engine's position jumped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscontinuityReason {
    /// Playback moved to the next item on its own
    AutoTransition,
    /// Explicit seek
    Seek,
    SeekAdjustment,
    Skip,
    Remove,
    Internal,
}

impl DiscontinuityReason {
    /// Only these reasons may move the current index
    pub fn changes_index(self) -> bool {
        matches!(self, DiscontinuityReason::AutoTransition | DiscontinuityReason::Seek)
    }
}

/// Category of an engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Source,
    Renderer,
    Unexpected,
    /// Engine-specific code outside the well-known categories
    Other(i32),
    /// Synchronous call refused (e.g. seek to an index that does not exist)
    Rejected,
}

impl EngineErrorKind {
    pub fn code(self) -> i32 {
        match self {
            EngineErrorKind::Source => 0,
            EngineErrorKind::Renderer => 1,
            EngineErrorKind::Unexpected => 2,
            EngineErrorKind::Other(code) => code,
            EngineErrorKind::Rejected => crate::error::ERROR_ILLEGAL_STATE,
        }
    }
}

/// Error reported by the engine, either synchronously or through a callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn source(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Source, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Rejected, message)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for EngineError {}

/// Metadata extracted by the engine from a stream
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataEntry {
    IcyInfo(IcyInfo),
    IcyHeaders(IcyHeaders),
    /// Anything the controller does not interpret
    Other(String),
}

/// Callback surface consumed from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    PlaybackStateChanged(EngineState),
    PositionDiscontinuity { reason: DiscontinuityReason },
    TimelineChanged,
    PlayerError(EngineError),
    /// Format metadata of the selected tracks
    TracksChanged(Vec<MetadataEntry>),
    /// Timed in-stream metadata
    Metadata(Vec<MetadataEntry>),
    AudioSessionIdChanged(Option<i32>),
}

/// Speed and pitch multipliers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParameters {
    pub speed: f32,
    pub pitch: f32,
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self { speed: 1.0, pitch: 1.0 }
    }
}

/// Engine repeat mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    Off,
    One,
    All,
}

impl TryFrom<i64> for LoopMode {
    type Error = crate::error::PlayerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LoopMode::Off),
            1 => Ok(LoopMode::One),
            2 => Ok(LoopMode::All),
            other => Err(crate::error::PlayerError::InvalidCommandArgument(format!(
                "unknown loop mode {}",
                other
            ))),
        }
    }
}

/// Output stream attributes (content type, flags, usage)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAttributes {
    pub content_type: i32,
    pub flags: i32,
    pub usage: i32,
}

/// Buffering thresholds handed to the engine at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadControl {
    pub min_buffer_us: u64,
    pub max_buffer_us: u64,
    pub buffer_for_playback_us: u64,
    pub buffer_for_playback_after_rebuffer_us: u64,
    pub prioritize_time_over_size_thresholds: bool,
    pub back_buffer_us: u64,
    pub target_buffer_bytes: Option<u32>,
}

impl Default for LoadControl {
    fn default() -> Self {
        Self {
            min_buffer_us: 50_000_000,
            max_buffer_us: 50_000_000,
            buffer_for_playback_us: 2_500_000,
            buffer_for_playback_after_rebuffer_us: 5_000_000,
            prioritize_time_over_size_thresholds: false,
            back_buffer_us: 0,
            target_buffer_bytes: None,
        }
    }
}

/// Speed adjustment used to hold a target live offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivePlaybackSpeedControl {
    pub fallback_min_playback_speed: f32,
    pub fallback_max_playback_speed: f32,
    pub min_update_interval_us: u64,
    pub proportional_control_factor: f32,
    pub max_live_offset_error_us_for_unit_speed: u64,
    pub target_live_offset_increment_on_rebuffer_us: u64,
    pub min_possible_live_offset_smoothing_factor: f32,
}

impl Default for LivePlaybackSpeedControl {
    fn default() -> Self {
        Self {
            fallback_min_playback_speed: 0.97,
            fallback_max_playback_speed: 1.03,
            min_update_interval_us: 1_000_000,
            proportional_control_factor: 0.1,
            max_live_offset_error_us_for_unit_speed: 20_000,
            target_live_offset_increment_on_rebuffer_us: 500_000,
            min_possible_live_offset_smoothing_factor: 0.999,
        }
    }
}

/// Construction-time engine options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Prepare playlist items only when they are about to play
    pub lazy_preparation: bool,
    /// Let the engine offload decoding (may disable gapless and speed changes)
    pub offload_scheduling: bool,
    pub load_control: Option<LoadControl>,
    pub live_playback_speed_control: Option<LivePlaybackSpeedControl>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            lazy_preparation: true,
            offload_scheduling: false,
            load_control: None,
            live_playback_speed_control: None,
        }
    }
}

/// Operations the controller issues to the engine
///
/// Calls never block: their effects arrive later as [`EngineEvent`]s.
/// Positions and durations are microseconds.
pub trait AudioEngine: Send + 'static {
    /// Apply construction-time options; called once before any other command
    fn configure(&mut self, options: &EngineOptions);

    fn audio_session_id(&self) -> Option<i32>;

    fn playback_state(&self) -> EngineState;

    fn play_when_ready(&self) -> bool;
    fn set_play_when_ready(&mut self, play_when_ready: bool);

    fn current_position_us(&self) -> u64;
    fn buffered_position_us(&self) -> u64;
    /// `None` while the duration is unknown
    fn duration_us(&self) -> Option<u64>;

    /// Position of the render clock; sampled by the stall detector
    fn render_position_us(&self) -> u64 {
        self.current_position_us()
    }

    fn current_media_item_index(&self) -> usize;
    fn media_item_count(&self) -> usize;
    fn has_next_media_item(&self) -> bool;

    /// Replace the playlist; `lazy_preparation` overrides the configured default for it
    fn set_media_sources(
        &mut self,
        sources: Vec<MediaSource>,
        start_index: usize,
        start_position_us: Option<u64>,
        lazy_preparation: bool,
    );
    fn set_shuffle_order(&mut self, order: ShuffleOrder);

    /// Insert items and install the matching shuffle order in one step
    fn add_media_sources(&mut self, index: usize, sources: Vec<MediaSource>, order: ShuffleOrder) -> Result<(), EngineError>;
    /// Remove items `[start, end)` and install the matching shuffle order in one step
    fn remove_media_items(&mut self, start: usize, end: usize, order: ShuffleOrder) -> Result<(), EngineError>;
    /// Move one item and install the matching shuffle order in one step
    fn move_media_item(&mut self, from: usize, to: usize, order: ShuffleOrder) -> Result<(), EngineError>;

    fn prepare(&mut self);
    fn stop(&mut self);
    fn release(&mut self);

    /// Seek within item `index`; `None` seeks to the item's default position
    fn seek_to(&mut self, index: usize, position_us: Option<u64>) -> Result<(), EngineError>;
    fn seek_to_next_media_item(&mut self) -> Result<(), EngineError>;

    fn playback_parameters(&self) -> PlaybackParameters;
    fn set_playback_parameters(&mut self, parameters: PlaybackParameters);

    fn set_volume(&mut self, volume: f32);
    fn set_skip_silence_enabled(&mut self, enabled: bool);
    fn set_repeat_mode(&mut self, mode: LoopMode);
    fn set_shuffle_mode_enabled(&mut self, enabled: bool);
    fn set_audio_attributes(&mut self, attributes: AudioAttributes);
}
