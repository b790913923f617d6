//! Commands accepted by the playback controller

use serde::Serialize;
use serde_json::Value;

use super::pending::Responder;
use crate::effects::EqualizerParameters;
use crate::engine::{AudioAttributes, LoopMode};

/// One host command with its arguments
///
/// Positions are microseconds, gains decibels.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Load {
        /// Top-level playlist descriptor (`children` plus optional `shuffleOrder`)
        audio_source: Value,
        initial_position_us: Option<u64>,
        initial_index: Option<usize>,
    },
    Play,
    Pause,
    Seek {
        /// `None` seeks to the item's default position
        position_us: Option<u64>,
        /// `None` stays on the current item
        index: Option<usize>,
    },
    SetVolume(f32),
    SetSpeed(f32),
    SetPitch(f32),
    SetSkipSilence(bool),
    SetLoopMode(LoopMode),
    SetShuffleModeEnabled(bool),
    SetShuffleOrder {
        audio_source: Value,
    },
    /// Playlist edits; an empty `id` addresses the top-level playlist
    InsertAll {
        id: String,
        index: usize,
        children: Vec<Value>,
        shuffle_order: Vec<usize>,
    },
    RemoveRange {
        id: String,
        start: usize,
        end: usize,
        shuffle_order: Vec<usize>,
    },
    Move {
        id: String,
        from: usize,
        to: usize,
        shuffle_order: Vec<usize>,
    },
    SetAudioAttributes(AudioAttributes),
    SetAutomaticallyWaitsToMinimizeStalling(bool),
    SetCanUseNetworkResourcesForLiveStreamingWhilePaused(bool),
    SetPreferredPeakBitRate(f64),
    AudioEffectSetEnabled {
        type_name: String,
        enabled: bool,
    },
    LoudnessEnhancerSetTargetGain(f64),
    EqualizerGetParameters,
    EqualizerBandSetGain {
        band: usize,
        gain: f64,
    },
    Dispose,
}

impl PlayerCommand {
    /// Wire name of the command, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCommand::Load { .. } => "load",
            PlayerCommand::Play => "play",
            PlayerCommand::Pause => "pause",
            PlayerCommand::Seek { .. } => "seek",
            PlayerCommand::SetVolume(_) => "setVolume",
            PlayerCommand::SetSpeed(_) => "setSpeed",
            PlayerCommand::SetPitch(_) => "setPitch",
            PlayerCommand::SetSkipSilence(_) => "setSkipSilence",
            PlayerCommand::SetLoopMode(_) => "setLoopMode",
            PlayerCommand::SetShuffleModeEnabled(_) => "setShuffleModeEnabled",
            PlayerCommand::SetShuffleOrder { .. } => "setShuffleOrder",
            PlayerCommand::InsertAll { .. } => "insertAll",
            PlayerCommand::RemoveRange { .. } => "removeRange",
            PlayerCommand::Move { .. } => "move",
            PlayerCommand::SetAudioAttributes(_) => "setAudioAttributes",
            PlayerCommand::SetAutomaticallyWaitsToMinimizeStalling(_) => "setAutomaticallyWaitsToMinimizeStalling",
            PlayerCommand::SetCanUseNetworkResourcesForLiveStreamingWhilePaused(_) => {
                "setCanUseNetworkResourcesForLiveStreamingWhilePaused"
            }
            PlayerCommand::SetPreferredPeakBitRate(_) => "setPreferredPeakBitRate",
            PlayerCommand::AudioEffectSetEnabled { .. } => "audioEffectSetEnabled",
            PlayerCommand::LoudnessEnhancerSetTargetGain(_) => "loudnessEnhancerSetTargetGain",
            PlayerCommand::EqualizerGetParameters => "equalizerGetParameters",
            PlayerCommand::EqualizerBandSetGain { .. } => "equalizerBandSetGain",
            PlayerCommand::Dispose => "dispose",
        }
    }
}

/// Successful command result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandResponse {
    /// Serialized as `{}`
    Empty {},
    #[serde(rename_all = "camelCase")]
    Loaded {
        /// Milliseconds; `None` while the duration is unknown
        duration_ms: Option<u64>,
    },
    EqualizerParameters {
        parameters: EqualizerParameters,
    },
}

impl CommandResponse {
    pub fn empty() -> Self {
        CommandResponse::Empty {}
    }
}

/// Command paired with the slot its result is settled into
pub type CommandEnvelope = (PlayerCommand, Responder<CommandResponse>);
