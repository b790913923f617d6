//! Audio effects bound to the playback session
//!
//! Effect descriptors are configured once per player. Handles are created by
//! an [`EffectFactory`] for a specific audio session and live in the
//! [`EffectsChain`] until the session changes.
//!
//! Gains cross this boundary in decibels; effect primitives work in
//! millibels (dB × 100) and millihertz.

mod chain;

pub use chain::EffectsChain;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::engine::EngineError;
use crate::error::{PlayerError, Result};

/// Effect type key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectKind {
    LoudnessEnhancer,
    Equalizer,
}

impl EffectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EffectKind::LoudnessEnhancer => "LoudnessEnhancer",
            EffectKind::Equalizer => "Equalizer",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectKind {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LoudnessEnhancer" | "AndroidLoudnessEnhancer" => Ok(EffectKind::LoudnessEnhancer),
            "Equalizer" | "AndroidEqualizer" => Ok(EffectKind::Equalizer),
            other => Err(PlayerError::UnsupportedEffectType(other.to_string())),
        }
    }
}

/// Configured effect with its initial parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EffectDescriptor {
    #[serde(alias = "AndroidLoudnessEnhancer", rename_all = "camelCase")]
    LoudnessEnhancer {
        #[serde(default)]
        enabled: bool,
        /// Decibels
        #[serde(default)]
        target_gain: f64,
    },
    #[serde(alias = "AndroidEqualizer", rename_all = "camelCase")]
    Equalizer {
        #[serde(default)]
        enabled: bool,
        /// Decibels per band, applied in band order
        #[serde(default, skip_serializing_if = "Option::is_none")]
        band_gains: Option<Vec<f64>>,
    },
}

impl EffectDescriptor {
    /// Decode an untyped descriptor, rejecting unknown `type` tags first
    pub fn from_json(value: &Value) -> Result<Self> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| PlayerError::InvalidCommandArgument(format!("audio effect without type: {}", value)))?;
        tag.parse::<EffectKind>()?;
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            EffectDescriptor::LoudnessEnhancer { .. } => EffectKind::LoudnessEnhancer,
            EffectDescriptor::Equalizer { .. } => EffectKind::Equalizer,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            EffectDescriptor::LoudnessEnhancer { enabled, .. } | EffectDescriptor::Equalizer { enabled, .. } => {
                *enabled
            }
        }
    }
}

/// Decibels to millibels, rounded
pub fn db_to_mb(db: f64) -> i32 {
    (db * 100.0).round() as i32
}

pub fn mb_to_db(mb: i32) -> f64 {
    f64::from(mb) / 100.0
}

pub fn mhz_to_hz(mhz: i32) -> f64 {
    f64::from(mhz) / 1000.0
}

/// Common surface of every effect primitive
pub trait AudioEffect: Send {
    fn set_enabled(&mut self, enabled: bool) -> std::result::Result<(), EngineError>;
    fn release(&mut self);
}

pub trait LoudnessEnhancer: AudioEffect {
    fn set_target_gain_mb(&mut self, gain_mb: i32) -> std::result::Result<(), EngineError>;
}

pub trait Equalizer: AudioEffect {
    /// (min, max) band level in millibels
    fn band_level_range_mb(&self) -> (i32, i32);
    fn number_of_bands(&self) -> usize;
    /// (lower, upper) band edge in millihertz
    fn band_freq_range_mhz(&self, band: usize) -> (i32, i32);
    fn center_freq_mhz(&self, band: usize) -> i32;
    fn band_level_mb(&self, band: usize) -> i32;
    fn set_band_level_mb(&mut self, band: usize, level_mb: i32) -> std::result::Result<(), EngineError>;
}

/// Creates effect primitives attached to an audio session
pub trait EffectFactory: Send {
    fn loudness_enhancer(&mut self, session_id: i32) -> std::result::Result<Box<dyn LoudnessEnhancer>, EngineError>;
    fn equalizer(&mut self, session_id: i32) -> std::result::Result<Box<dyn Equalizer>, EngineError>;
}

/// Live effect instance owned by the chain
pub enum EffectHandle {
    LoudnessEnhancer(Box<dyn LoudnessEnhancer>),
    Equalizer(Box<dyn Equalizer>),
}

impl EffectHandle {
    pub fn set_enabled(&mut self, enabled: bool) -> std::result::Result<(), EngineError> {
        match self {
            EffectHandle::LoudnessEnhancer(effect) => effect.set_enabled(enabled),
            EffectHandle::Equalizer(effect) => effect.set_enabled(enabled),
        }
    }

    pub fn release(&mut self) {
        match self {
            EffectHandle::LoudnessEnhancer(effect) => effect.release(),
            EffectHandle::Equalizer(effect) => effect.release(),
        }
    }
}

/// One equalizer band as reported to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqualizerBand {
    pub index: usize,
    /// Hz
    pub lower_frequency: f64,
    pub upper_frequency: f64,
    pub center_frequency: f64,
    /// dB
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqualizerParameters {
    pub min_decibels: f64,
    pub max_decibels: f64,
    pub bands: Vec<EqualizerBand>,
}
