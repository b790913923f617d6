//! Control-path simulator for the audio engine
//!
//! [`SimulatedEngine`] renders no audio. It keeps the bookkeeping a real
//! engine exposes (state, positions, playlist, parameters), records every
//! call for assertions, and in autonomous mode emits the callbacks a real
//! engine would produce after `prepare`, `seek_to` and playlist edits.
//!
//! Clones share state, so a test can keep one clone for inspection while the
//! controller owns another.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::trace;

use super::{
    AudioAttributes, AudioEngine, DiscontinuityReason, EngineError, EngineErrorKind, EngineEvent, EngineOptions,
    EngineState, LoopMode, PlaybackParameters,
};
use crate::effects::{AudioEffect, EffectFactory, EffectKind, Equalizer, LoudnessEnhancer};
use crate::source::{MediaKind, MediaSource, ShuffleOrder};

/// Duration reported for items whose length cannot be derived from the descriptor
pub const DEFAULT_ITEM_DURATION_US: u64 = 180_000_000;

/// One recorded engine call
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Configure,
    SetPlayWhenReady(bool),
    SetMediaSources { ids: Vec<String>, start_index: usize, start_position_us: Option<u64>, lazy_preparation: bool },
    SetShuffleOrder(Vec<usize>),
    AddMediaSources { index: usize, ids: Vec<String> },
    RemoveMediaItems { start: usize, end: usize },
    MoveMediaItem { from: usize, to: usize },
    Prepare,
    Stop,
    Release,
    SeekTo { index: usize, position_us: Option<u64> },
    SeekToNext,
    SetPlaybackParameters(PlaybackParameters),
    SetVolume(f32),
    SetSkipSilence(bool),
    SetRepeatMode(LoopMode),
    SetShuffleMode(bool),
    SetAudioAttributes(AudioAttributes),
}

#[derive(Debug)]
struct SimState {
    options: Option<EngineOptions>,
    state: EngineState,
    play_when_ready: bool,
    position_us: u64,
    /// Wall-clock anchor for the autonomous position clock
    anchor: Option<Instant>,
    buffered_us: u64,
    render_override: Option<u64>,
    duration_override: Option<Option<u64>>,
    current_index: usize,
    items: Vec<MediaSource>,
    shuffle: Option<ShuffleOrder>,
    parameters: PlaybackParameters,
    session_id: Option<i32>,
    reject_seeks: bool,
    calls: Vec<EngineCall>,
    events: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl SimState {
    fn emit(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            trace!("Simulated engine emits {:?}", event);
            let _ = events.send(event);
        }
    }

    fn autonomous(&self) -> bool {
        self.events.is_some()
    }

    fn advancing(&self) -> bool {
        self.autonomous() && self.play_when_ready && self.state == EngineState::Ready
    }

    fn position(&self) -> u64 {
        let position = match self.anchor {
            Some(anchor) if self.advancing() => {
                let elapsed = anchor.elapsed().as_micros() as f64 * f64::from(self.parameters.speed);
                self.position_us + elapsed as u64
            }
            _ => self.position_us,
        };
        match self.duration() {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    /// Freeze the autonomous clock at the current position
    fn settle_clock(&mut self) {
        self.position_us = self.position();
        self.anchor = if self.advancing() { Some(Instant::now()) } else { None };
    }

    fn duration(&self) -> Option<u64> {
        if let Some(duration) = self.duration_override {
            return duration;
        }
        if self.state == EngineState::Idle {
            return None;
        }
        self.items.get(self.current_index).and_then(|item| item_duration(item))
    }
}

fn item_duration(item: &MediaSource) -> Option<u64> {
    match item.kind() {
        MediaKind::Silence { duration_us } => Some(*duration_us),
        MediaKind::Clipping { child, start_us, end_us } => {
            let end = (*end_us).or_else(|| item_duration(child))?;
            Some(end.saturating_sub(*start_us))
        }
        MediaKind::Concatenating(source) => source.children().iter().map(item_duration).sum(),
        _ => Some(DEFAULT_ITEM_DURATION_US),
    }
}

fn ids(sources: &[MediaSource]) -> Vec<String> {
    sources.iter().map(|s| s.id().to_string()).collect()
}

/// Engine stand-in driven by tests or by the demo binary
#[derive(Debug, Clone)]
pub struct SimulatedEngine {
    inner: Arc<Mutex<SimState>>,
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEngine {
    /// Passive engine: state only changes through the test setters
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                options: None,
                state: EngineState::Idle,
                play_when_ready: false,
                position_us: 0,
                anchor: None,
                buffered_us: 0,
                render_override: None,
                duration_override: None,
                current_index: 0,
                items: Vec::new(),
                shuffle: None,
                parameters: PlaybackParameters::default(),
                session_id: None,
                reject_seeks: false,
                calls: Vec::new(),
                events: None,
            })),
        }
    }

    /// Engine that answers its own commands with callbacks on `events`
    pub fn autonomous(session_id: Option<i32>, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        let engine = Self::new();
        {
            let mut state = engine.lock();
            state.session_id = session_id;
            state.events = Some(events);
        }
        engine
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: EngineCall) -> MutexGuard<'_, SimState> {
        let mut state = self.lock();
        state.calls.push(call);
        state
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn count_calls(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn options(&self) -> Option<EngineOptions> {
        self.lock().options.clone()
    }

    pub fn item_ids(&self) -> Vec<String> {
        ids(&self.lock().items)
    }

    pub fn items(&self) -> Vec<MediaSource> {
        self.lock().items.clone()
    }

    pub fn shuffle_order(&self) -> Option<ShuffleOrder> {
        self.lock().shuffle.clone()
    }

    pub fn set_state(&self, engine_state: EngineState) {
        let mut state = self.lock();
        state.settle_clock();
        state.state = engine_state;
        state.settle_clock();
    }

    pub fn set_position_us(&self, position_us: u64) {
        let mut state = self.lock();
        state.position_us = position_us;
        state.anchor = if state.advancing() { Some(Instant::now()) } else { None };
    }

    pub fn set_buffered_position_us(&self, buffered_us: u64) {
        self.lock().buffered_us = buffered_us;
    }

    /// Pin the render clock independently of the playback position
    pub fn set_render_position_us(&self, render_us: Option<u64>) {
        self.lock().render_override = render_us;
    }

    /// Override the derived duration (`Some(None)` reports an unset duration)
    pub fn set_duration_us(&self, duration_us: Option<u64>) {
        self.lock().duration_override = Some(duration_us);
    }

    pub fn set_current_index(&self, index: usize) {
        self.lock().current_index = index;
    }

    pub fn set_session_id(&self, session_id: Option<i32>) {
        self.lock().session_id = session_id;
    }

    pub fn reject_seeks(&self, reject: bool) {
        self.lock().reject_seeks = reject;
    }
}

impl AudioEngine for SimulatedEngine {
    fn configure(&mut self, options: &EngineOptions) {
        self.record(EngineCall::Configure).options = Some(options.clone());
    }

    fn audio_session_id(&self) -> Option<i32> {
        self.lock().session_id
    }

    fn playback_state(&self) -> EngineState {
        self.lock().state
    }

    fn play_when_ready(&self) -> bool {
        self.lock().play_when_ready
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        let mut state = self.record(EngineCall::SetPlayWhenReady(play_when_ready));
        state.settle_clock();
        state.play_when_ready = play_when_ready;
        state.settle_clock();
    }

    fn current_position_us(&self) -> u64 {
        self.lock().position()
    }

    fn buffered_position_us(&self) -> u64 {
        let state = self.lock();
        if state.autonomous() && state.state != EngineState::Idle {
            return state.duration().unwrap_or(state.buffered_us).max(state.buffered_us);
        }
        state.buffered_us
    }

    fn duration_us(&self) -> Option<u64> {
        self.lock().duration()
    }

    fn render_position_us(&self) -> u64 {
        let state = self.lock();
        state.render_override.unwrap_or_else(|| state.position())
    }

    fn current_media_item_index(&self) -> usize {
        self.lock().current_index
    }

    fn media_item_count(&self) -> usize {
        self.lock().items.len()
    }

    fn has_next_media_item(&self) -> bool {
        let state = self.lock();
        state.current_index + 1 < state.items.len()
    }

    fn set_media_sources(
        &mut self,
        sources: Vec<MediaSource>,
        start_index: usize,
        start_position_us: Option<u64>,
        lazy_preparation: bool,
    ) {
        let mut state = self.record(EngineCall::SetMediaSources {
            ids: ids(&sources),
            start_index,
            start_position_us,
            lazy_preparation,
        });
        state.items = sources;
        state.current_index = start_index;
        state.position_us = start_position_us.unwrap_or(0);
        state.anchor = None;
        state.emit(EngineEvent::TimelineChanged);
    }

    fn set_shuffle_order(&mut self, order: ShuffleOrder) {
        let indices = order.indices().to_vec();
        self.record(EngineCall::SetShuffleOrder(indices)).shuffle = Some(order);
    }

    fn add_media_sources(&mut self, index: usize, sources: Vec<MediaSource>, order: ShuffleOrder) -> Result<(), EngineError> {
        let mut state = self.record(EngineCall::AddMediaSources { index, ids: ids(&sources) });
        if index > state.items.len() {
            return Err(EngineError::rejected(format!("insert index {} out of range", index)));
        }
        let added = sources.len();
        let was_empty = state.items.is_empty();
        state.items.splice(index..index, sources);
        if !was_empty && index <= state.current_index {
            state.current_index += added;
        }
        state.shuffle = Some(order);
        state.emit(EngineEvent::TimelineChanged);
        Ok(())
    }

    fn remove_media_items(&mut self, start: usize, end: usize, order: ShuffleOrder) -> Result<(), EngineError> {
        let mut state = self.record(EngineCall::RemoveMediaItems { start, end });
        if start > end || end > state.items.len() {
            return Err(EngineError::rejected(format!("remove range {}..{} out of range", start, end)));
        }
        state.items.drain(start..end);
        if state.current_index >= end {
            state.current_index -= end - start;
        } else if state.current_index >= start {
            state.current_index = start.min(state.items.len().saturating_sub(1));
        }
        state.shuffle = Some(order);
        state.emit(EngineEvent::TimelineChanged);
        Ok(())
    }

    fn move_media_item(&mut self, from: usize, to: usize, order: ShuffleOrder) -> Result<(), EngineError> {
        let mut state = self.record(EngineCall::MoveMediaItem { from, to });
        let len = state.items.len();
        if from >= len || to >= len {
            return Err(EngineError::rejected(format!("move {} -> {} out of range", from, to)));
        }
        let item = state.items.remove(from);
        state.items.insert(to, item);
        let current = state.current_index;
        state.current_index = if current == from {
            to
        } else if from < current && current <= to {
            current - 1
        } else if to <= current && current < from {
            current + 1
        } else {
            current
        };
        state.shuffle = Some(order);
        state.emit(EngineEvent::TimelineChanged);
        Ok(())
    }

    fn prepare(&mut self) {
        let mut state = self.record(EngineCall::Prepare);
        if !state.autonomous() {
            return;
        }
        if state.items.is_empty() {
            state.state = EngineState::Ended;
            state.emit(EngineEvent::PlaybackStateChanged(EngineState::Ended));
            return;
        }
        state.state = EngineState::Buffering;
        state.emit(EngineEvent::PlaybackStateChanged(EngineState::Buffering));
        state.state = EngineState::Ready;
        state.settle_clock();
        state.emit(EngineEvent::PlaybackStateChanged(EngineState::Ready));
    }

    fn stop(&mut self) {
        let mut state = self.record(EngineCall::Stop);
        state.settle_clock();
        state.state = EngineState::Idle;
        state.anchor = None;
    }

    fn release(&mut self) {
        let mut state = self.record(EngineCall::Release);
        state.state = EngineState::Idle;
        state.anchor = None;
        state.items.clear();
        state.events = None;
    }

    fn seek_to(&mut self, index: usize, position_us: Option<u64>) -> Result<(), EngineError> {
        let mut state = self.record(EngineCall::SeekTo { index, position_us });
        if state.reject_seeks || (state.autonomous() && index >= state.items.len()) {
            return Err(EngineError::rejected(format!("cannot seek to item {}", index)));
        }
        state.current_index = index;
        state.position_us = position_us.unwrap_or(0);
        state.anchor = None;
        if state.autonomous() {
            state.emit(EngineEvent::PositionDiscontinuity { reason: DiscontinuityReason::Seek });
            state.state = EngineState::Buffering;
            state.emit(EngineEvent::PlaybackStateChanged(EngineState::Buffering));
            state.state = EngineState::Ready;
            state.settle_clock();
            state.emit(EngineEvent::PlaybackStateChanged(EngineState::Ready));
        }
        Ok(())
    }

    fn seek_to_next_media_item(&mut self) -> Result<(), EngineError> {
        let mut state = self.record(EngineCall::SeekToNext);
        if state.current_index + 1 >= state.items.len() {
            return Err(EngineError::rejected("no next item"));
        }
        state.current_index += 1;
        state.position_us = 0;
        state.anchor = None;
        if state.autonomous() {
            state.emit(EngineEvent::PositionDiscontinuity { reason: DiscontinuityReason::Seek });
            state.state = EngineState::Ready;
            state.settle_clock();
            state.emit(EngineEvent::PlaybackStateChanged(EngineState::Ready));
        }
        Ok(())
    }

    fn playback_parameters(&self) -> PlaybackParameters {
        self.lock().parameters
    }

    fn set_playback_parameters(&mut self, parameters: PlaybackParameters) {
        let mut state = self.record(EngineCall::SetPlaybackParameters(parameters));
        state.settle_clock();
        state.parameters = parameters;
    }

    fn set_volume(&mut self, volume: f32) {
        self.record(EngineCall::SetVolume(volume));
    }

    fn set_skip_silence_enabled(&mut self, enabled: bool) {
        self.record(EngineCall::SetSkipSilence(enabled));
    }

    fn set_repeat_mode(&mut self, mode: LoopMode) {
        self.record(EngineCall::SetRepeatMode(mode));
    }

    fn set_shuffle_mode_enabled(&mut self, enabled: bool) {
        self.record(EngineCall::SetShuffleMode(enabled));
    }

    fn set_audio_attributes(&mut self, attributes: AudioAttributes) {
        self.record(EngineCall::SetAudioAttributes(attributes));
    }
}

#[derive(Debug, Default)]
struct EffectsRecord {
    created: Vec<(EffectKind, i32)>,
    released: usize,
    enabled: BTreeMap<EffectKind, bool>,
    target_gain_mb: Option<i32>,
    band_levels_mb: Vec<i32>,
    failing: BTreeSet<EffectKind>,
    rejecting: BTreeSet<EffectKind>,
}

/// Effect factory producing inspectable in-memory effects
#[derive(Debug, Clone, Default)]
pub struct SimulatedEffects {
    record: Arc<Mutex<EffectsRecord>>,
}

impl SimulatedEffects {
    pub const BANDS: usize = 5;
    const CENTER_FREQS_MHZ: [i32; Self::BANDS] = [60_000, 230_000, 910_000, 3_600_000, 14_000_000];
    const LEVEL_RANGE_MB: (i32, i32) = (-1500, 1500);

    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EffectsRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every later instantiation of `kind` fail
    pub fn fail_kind(&self, kind: EffectKind) {
        self.lock().failing.insert(kind);
    }

    /// Make every parameter or enable call on `kind` fail after creation
    pub fn reject_setup(&self, kind: EffectKind) {
        self.lock().rejecting.insert(kind);
    }

    pub fn created(&self) -> Vec<(EffectKind, i32)> {
        self.lock().created.clone()
    }

    pub fn released(&self) -> usize {
        self.lock().released
    }

    pub fn enabled(&self, kind: EffectKind) -> Option<bool> {
        self.lock().enabled.get(&kind).copied()
    }

    pub fn target_gain_mb(&self) -> Option<i32> {
        self.lock().target_gain_mb
    }

    pub fn band_level_mb(&self, band: usize) -> Option<i32> {
        self.lock().band_levels_mb.get(band).copied()
    }

    fn create(&self, kind: EffectKind, session_id: i32) -> Result<SimulatedEffect, EngineError> {
        let mut record = self.lock();
        if record.failing.contains(&kind) {
            return Err(EngineError::new(EngineErrorKind::Unexpected, format!("{} unavailable", kind)));
        }
        record.created.push((kind, session_id));
        record.enabled.insert(kind, false);
        if kind == EffectKind::Equalizer {
            record.band_levels_mb = vec![0; Self::BANDS];
        }
        Ok(SimulatedEffect { kind, record: Arc::clone(&self.record) })
    }
}

impl EffectFactory for SimulatedEffects {
    fn loudness_enhancer(&mut self, session_id: i32) -> Result<Box<dyn LoudnessEnhancer>, EngineError> {
        Ok(Box::new(self.create(EffectKind::LoudnessEnhancer, session_id)?))
    }

    fn equalizer(&mut self, session_id: i32) -> Result<Box<dyn Equalizer>, EngineError> {
        Ok(Box::new(self.create(EffectKind::Equalizer, session_id)?))
    }
}

struct SimulatedEffect {
    kind: EffectKind,
    record: Arc<Mutex<EffectsRecord>>,
}

impl SimulatedEffect {
    fn lock(&self) -> MutexGuard<'_, EffectsRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_accepts(record: &EffectsRecord, kind: EffectKind) -> Result<(), EngineError> {
        if record.rejecting.contains(&kind) {
            return Err(EngineError::rejected(format!("{} refused the call", kind)));
        }
        Ok(())
    }
}

impl AudioEffect for SimulatedEffect {
    fn set_enabled(&mut self, enabled: bool) -> Result<(), EngineError> {
        let mut record = self.lock();
        Self::check_accepts(&record, self.kind)?;
        record.enabled.insert(self.kind, enabled);
        Ok(())
    }

    fn release(&mut self) {
        let mut record = self.lock();
        record.released += 1;
        record.enabled.remove(&self.kind);
    }
}

impl LoudnessEnhancer for SimulatedEffect {
    fn set_target_gain_mb(&mut self, gain_mb: i32) -> Result<(), EngineError> {
        let mut record = self.lock();
        Self::check_accepts(&record, self.kind)?;
        record.target_gain_mb = Some(gain_mb);
        Ok(())
    }
}

impl Equalizer for SimulatedEffect {
    fn band_level_range_mb(&self) -> (i32, i32) {
        SimulatedEffects::LEVEL_RANGE_MB
    }

    fn number_of_bands(&self) -> usize {
        SimulatedEffects::BANDS
    }

    fn band_freq_range_mhz(&self, band: usize) -> (i32, i32) {
        let center = SimulatedEffects::CENTER_FREQS_MHZ[band.min(SimulatedEffects::BANDS - 1)];
        (center / 2, center * 2)
    }

    fn center_freq_mhz(&self, band: usize) -> i32 {
        SimulatedEffects::CENTER_FREQS_MHZ[band.min(SimulatedEffects::BANDS - 1)]
    }

    fn band_level_mb(&self, band: usize) -> i32 {
        self.lock().band_levels_mb.get(band).copied().unwrap_or(0)
    }

    fn set_band_level_mb(&mut self, band: usize, level_mb: i32) -> Result<(), EngineError> {
        let (min, max) = SimulatedEffects::LEVEL_RANGE_MB;
        let mut record = self.lock();
        Self::check_accepts(&record, self.kind)?;
        match record.band_levels_mb.get_mut(band) {
            Some(level) => {
                *level = level_mb.clamp(min, max);
                Ok(())
            }
            None => Err(EngineError::rejected(format!("no band {}", band))),
        }
    }
}
