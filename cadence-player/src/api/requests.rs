//! Host request decoding
//!
//! Requests are JSON objects tagged by `method`. Positions are microseconds,
//! gains decibels. An optional `id` is echoed back on the reply.

use serde::Deserialize;
use serde_json::Value;

use crate::engine::{AudioAttributes, LoopMode};
use crate::error::{PlayerError, Result};
use crate::playback::PlayerCommand;

/// One decoded host request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HostRequest {
    Load {
        audio_source: Value,
        #[serde(default)]
        initial_position: Option<u64>,
        #[serde(default)]
        initial_index: Option<usize>,
    },
    Play,
    Pause,
    Seek {
        #[serde(default)]
        position: Option<u64>,
        #[serde(default)]
        index: Option<usize>,
    },
    SetVolume {
        volume: f32,
    },
    SetSpeed {
        speed: f32,
    },
    SetPitch {
        pitch: f32,
    },
    SetSkipSilence {
        enabled: bool,
    },
    /// 0 off, 1 one, 2 all
    SetLoopMode {
        loop_mode: i64,
    },
    /// 0 none, 1 all
    SetShuffleMode {
        shuffle_mode: i64,
    },
    SetShuffleOrder {
        audio_source: Value,
    },
    #[serde(alias = "concatenatingInsertAll")]
    InsertAll {
        #[serde(default)]
        id: String,
        index: usize,
        children: Vec<Value>,
        #[serde(default)]
        shuffle_order: Vec<usize>,
    },
    #[serde(alias = "concatenatingRemoveRange")]
    RemoveRange {
        #[serde(default)]
        id: String,
        start_index: usize,
        end_index: usize,
        #[serde(default)]
        shuffle_order: Vec<usize>,
    },
    #[serde(alias = "concatenatingMove")]
    Move {
        #[serde(default)]
        id: String,
        current_index: usize,
        new_index: usize,
        #[serde(default)]
        shuffle_order: Vec<usize>,
    },
    #[serde(alias = "setAndroidAudioAttributes")]
    SetAudioAttributes {
        #[serde(default)]
        content_type: i32,
        #[serde(default)]
        flags: i32,
        #[serde(default)]
        usage: i32,
    },
    SetAutomaticallyWaitsToMinimizeStalling {
        #[serde(default)]
        enabled: bool,
    },
    SetCanUseNetworkResourcesForLiveStreamingWhilePaused {
        #[serde(default)]
        enabled: bool,
    },
    SetPreferredPeakBitRate {
        #[serde(default)]
        bit_rate: f64,
    },
    AudioEffectSetEnabled {
        #[serde(rename = "type")]
        effect_type: String,
        enabled: bool,
    },
    #[serde(alias = "androidLoudnessEnhancerSetTargetGain")]
    LoudnessEnhancerSetTargetGain {
        target_gain: f64,
    },
    #[serde(alias = "androidEqualizerGetParameters")]
    EqualizerGetParameters,
    #[serde(alias = "androidEqualizerBandSetGain")]
    EqualizerBandSetGain {
        band_index: usize,
        gain: f64,
    },
    Dispose,
}

impl HostRequest {
    /// Decode a request object; the `method` tag is checked before the arguments
    pub fn from_json(value: &Value) -> Result<Self> {
        if value.get("method").and_then(Value::as_str).is_none() {
            return Err(PlayerError::InvalidCommandArgument("request without method".to_string()));
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn into_command(self) -> Result<PlayerCommand> {
        let command = match self {
            HostRequest::Load { audio_source, initial_position, initial_index } => PlayerCommand::Load {
                audio_source,
                initial_position_us: initial_position,
                initial_index,
            },
            HostRequest::Play => PlayerCommand::Play,
            HostRequest::Pause => PlayerCommand::Pause,
            HostRequest::Seek { position, index } => PlayerCommand::Seek { position_us: position, index },
            HostRequest::SetVolume { volume } => PlayerCommand::SetVolume(volume),
            HostRequest::SetSpeed { speed } => PlayerCommand::SetSpeed(speed),
            HostRequest::SetPitch { pitch } => PlayerCommand::SetPitch(pitch),
            HostRequest::SetSkipSilence { enabled } => PlayerCommand::SetSkipSilence(enabled),
            HostRequest::SetLoopMode { loop_mode } => PlayerCommand::SetLoopMode(LoopMode::try_from(loop_mode)?),
            HostRequest::SetShuffleMode { shuffle_mode } => PlayerCommand::SetShuffleModeEnabled(shuffle_mode == 1),
            HostRequest::SetShuffleOrder { audio_source } => PlayerCommand::SetShuffleOrder { audio_source },
            HostRequest::InsertAll { id, index, children, shuffle_order } => {
                PlayerCommand::InsertAll { id, index, children, shuffle_order }
            }
            HostRequest::RemoveRange { id, start_index, end_index, shuffle_order } => PlayerCommand::RemoveRange {
                id,
                start: start_index,
                end: end_index,
                shuffle_order,
            },
            HostRequest::Move { id, current_index, new_index, shuffle_order } => PlayerCommand::Move {
                id,
                from: current_index,
                to: new_index,
                shuffle_order,
            },
            HostRequest::SetAudioAttributes { content_type, flags, usage } => {
                PlayerCommand::SetAudioAttributes(AudioAttributes { content_type, flags, usage })
            }
            HostRequest::SetAutomaticallyWaitsToMinimizeStalling { enabled } => {
                PlayerCommand::SetAutomaticallyWaitsToMinimizeStalling(enabled)
            }
            HostRequest::SetCanUseNetworkResourcesForLiveStreamingWhilePaused { enabled } => {
                PlayerCommand::SetCanUseNetworkResourcesForLiveStreamingWhilePaused(enabled)
            }
            HostRequest::SetPreferredPeakBitRate { bit_rate } => PlayerCommand::SetPreferredPeakBitRate(bit_rate),
            HostRequest::AudioEffectSetEnabled { effect_type, enabled } => PlayerCommand::AudioEffectSetEnabled {
                type_name: effect_type,
                enabled,
            },
            HostRequest::LoudnessEnhancerSetTargetGain { target_gain } => {
                PlayerCommand::LoudnessEnhancerSetTargetGain(target_gain)
            }
            HostRequest::EqualizerGetParameters => PlayerCommand::EqualizerGetParameters,
            HostRequest::EqualizerBandSetGain { band_index, gain } => {
                PlayerCommand::EqualizerBandSetGain { band: band_index, gain }
            }
            HostRequest::Dispose => PlayerCommand::Dispose,
        };
        Ok(command)
    }
}
