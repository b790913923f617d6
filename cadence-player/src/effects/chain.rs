use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{
    db_to_mb, mb_to_db, mhz_to_hz, EffectDescriptor, EffectFactory, EffectHandle, EffectKind, EqualizerBand,
    EqualizerParameters,
};
use crate::engine::EngineError;
use crate::error::{PlayerError, Result};

/// Effect handles for the current audio session
///
/// Handles are recreated from the configured descriptors whenever the
/// session id changes; with no session there are no handles.
pub struct EffectsChain {
    descriptors: Vec<EffectDescriptor>,
    factory: Box<dyn EffectFactory>,
    handles: BTreeMap<EffectKind, EffectHandle>,
}

impl EffectsChain {
    pub fn new(descriptors: Vec<EffectDescriptor>, factory: Box<dyn EffectFactory>) -> Self {
        Self { descriptors, factory, handles: BTreeMap::new() }
    }

    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.handles.contains_key(&kind)
    }

    /// Release every handle, then rebuild them for `session_id` if set
    pub fn on_session_changed(&mut self, session_id: Option<i32>) {
        self.release_all();

        let Some(session_id) = session_id else {
            return;
        };

        for descriptor in &self.descriptors {
            match instantiate(self.factory.as_mut(), descriptor, session_id) {
                Ok(handle) => {
                    debug!("Created {} for session {}", descriptor.kind(), session_id);
                    self.handles.insert(descriptor.kind(), handle);
                }
                Err(e) => {
                    warn!("Skipping {} for session {}: {}", descriptor.kind(), session_id, e);
                }
            }
        }
    }

    pub fn release_all(&mut self) {
        for (kind, mut handle) in std::mem::take(&mut self.handles) {
            debug!("Releasing {}", kind);
            handle.release();
        }
    }

    fn handle_mut(&mut self, kind: EffectKind) -> Result<&mut EffectHandle> {
        self.handles
            .get_mut(&kind)
            .ok_or_else(|| PlayerError::EffectNotConfigured(kind.to_string()))
    }

    /// Enable or disable the effect registered under `type_name`
    pub fn set_enabled(&mut self, type_name: &str, enabled: bool) -> Result<()> {
        let kind: EffectKind = type_name.parse()?;
        self.handle_mut(kind)?
            .set_enabled(enabled)
            .map_err(|e| PlayerError::from_engine(e, None))
    }

    /// Loudness target gain in dB
    pub fn set_target_gain(&mut self, target_gain_db: f64) -> Result<()> {
        match self.handle_mut(EffectKind::LoudnessEnhancer)? {
            EffectHandle::LoudnessEnhancer(effect) => effect
                .set_target_gain_mb(db_to_mb(target_gain_db))
                .map_err(|e| PlayerError::from_engine(e, None)),
            EffectHandle::Equalizer(_) => Err(PlayerError::EffectNotConfigured(EffectKind::LoudnessEnhancer.to_string())),
        }
    }

    pub fn equalizer_parameters(&mut self) -> Result<EqualizerParameters> {
        let EffectHandle::Equalizer(equalizer) = self.handle_mut(EffectKind::Equalizer)? else {
            return Err(PlayerError::EffectNotConfigured(EffectKind::Equalizer.to_string()));
        };

        let bands = (0..equalizer.number_of_bands())
            .map(|index| {
                let (lower, upper) = equalizer.band_freq_range_mhz(index);
                EqualizerBand {
                    index,
                    lower_frequency: mhz_to_hz(lower),
                    upper_frequency: mhz_to_hz(upper),
                    center_frequency: mhz_to_hz(equalizer.center_freq_mhz(index)),
                    gain: mb_to_db(equalizer.band_level_mb(index)),
                }
            })
            .collect();
        let (min, max) = equalizer.band_level_range_mb();

        Ok(EqualizerParameters { min_decibels: mb_to_db(min), max_decibels: mb_to_db(max), bands })
    }

    /// Band gain in dB
    pub fn set_band_gain(&mut self, band: usize, gain_db: f64) -> Result<()> {
        let EffectHandle::Equalizer(equalizer) = self.handle_mut(EffectKind::Equalizer)? else {
            return Err(PlayerError::EffectNotConfigured(EffectKind::Equalizer.to_string()));
        };
        if band >= equalizer.number_of_bands() {
            return Err(PlayerError::InvalidCommandArgument(format!("no equalizer band {}", band)));
        }
        equalizer
            .set_band_level_mb(band, db_to_mb(gain_db))
            .map_err(|e| PlayerError::from_engine(e, None))
    }
}

fn instantiate(
    factory: &mut dyn EffectFactory,
    descriptor: &EffectDescriptor,
    session_id: i32,
) -> std::result::Result<EffectHandle, EngineError> {
    let mut handle = match descriptor {
        EffectDescriptor::LoudnessEnhancer { .. } => EffectHandle::LoudnessEnhancer(factory.loudness_enhancer(session_id)?),
        EffectDescriptor::Equalizer { .. } => EffectHandle::Equalizer(factory.equalizer(session_id)?),
    };

    // A created effect holds a session resource until released
    if let Err(e) = configure(&mut handle, descriptor) {
        handle.release();
        return Err(e);
    }
    Ok(handle)
}

/// Apply the descriptor's initial parameters and enabled flag
fn configure(handle: &mut EffectHandle, descriptor: &EffectDescriptor) -> std::result::Result<(), EngineError> {
    match (&mut *handle, descriptor) {
        (EffectHandle::LoudnessEnhancer(effect), EffectDescriptor::LoudnessEnhancer { target_gain, .. }) => {
            effect.set_target_gain_mb(db_to_mb(*target_gain))?;
        }
        (EffectHandle::Equalizer(effect), EffectDescriptor::Equalizer { band_gains, .. }) => {
            for (band, gain) in band_gains.iter().flatten().enumerate().take(effect.number_of_bands()) {
                effect.set_band_level_mb(band, db_to_mb(*gain))?;
            }
        }
        _ => {}
    }

    if descriptor.enabled() {
        handle.set_enabled(true)?;
    }
    Ok(())
}
