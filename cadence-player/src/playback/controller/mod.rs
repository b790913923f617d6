//! Playback state machine
//!
//! The controller is the single authority over the processing state, the
//! pending command results, the current index and the latched error. It
//! drives the engine in response to host commands ([`commands`]) and folds
//! the engine's callbacks back into its state ([`callbacks`]).
//!
//! All methods take `&mut self`: the controller lives on one task and both
//! command and callback paths are serialized onto it.

mod callbacks;
mod commands;

use cadence_common::events::{IcyMetadata, PlaybackSnapshot, PlayerEvent, ProcessingState};
use cadence_common::time::micros_to_millis;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::broadcaster::EventBroadcaster;
use super::command::CommandResponse;
use super::pending::PendingSlot;
use super::position::{PositionConfig, PositionTracker, StallDetector};
use crate::effects::{EffectDescriptor, EffectFactory, EffectsChain};
use crate::engine::{AudioAttributes, AudioEngine, EngineOptions};
use crate::error::PlayerError;
use crate::source::{AudioSourceTree, ShuffleOrderManager};

/// Construction-time controller settings
#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    pub engine: EngineOptions,
    pub position: PositionConfig,
    pub effects: Vec<EffectDescriptor>,
    /// Fixed seed for shuffle orders; `None` seeds from entropy
    pub shuffle_seed: Option<u64>,
}

pub struct PlaybackController {
    /// `None` once disposed
    engine: Option<Box<dyn AudioEngine>>,
    broadcaster: EventBroadcaster,
    sources: AudioSourceTree,
    shuffle: ShuffleOrderManager,
    effects: EffectsChain,
    position: PositionTracker,
    position_config: PositionConfig,
    stall: StallDetector,

    processing_state: ProcessingState,
    current_index: Option<usize>,
    /// Latched `(code, message)` of the last engine error
    error: Option<(i32, String)>,
    icy: IcyMetadata,
    audio_session_id: Option<i32>,
    /// Configured default for playlists that leave `useLazyPreparation` unset
    lazy_preparation: bool,

    pending_load: PendingSlot<CommandResponse>,
    pending_play: PendingSlot<CommandResponse>,
    pending_seek: PendingSlot<CommandResponse>,

    /// Attributes requested while loading, applied once loading ends
    deferred_attributes: Option<AudioAttributes>,
    last_playlist_len: usize,
    buffer_watch_requested: bool,
}

impl PlaybackController {
    pub fn new(
        mut engine: Box<dyn AudioEngine>,
        effect_factory: Box<dyn EffectFactory>,
        options: ControllerOptions,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Self {
        engine.configure(&options.engine);
        let audio_session_id = engine.audio_session_id();

        let mut effects = EffectsChain::new(options.effects, effect_factory);
        if audio_session_id.is_some() {
            effects.on_session_changed(audio_session_id);
        }

        Self {
            engine: Some(engine),
            broadcaster: EventBroadcaster::new(events),
            sources: AudioSourceTree::new(),
            shuffle: ShuffleOrderManager::new(options.shuffle_seed),
            effects,
            position: PositionTracker::new(),
            stall: StallDetector::new(options.position.stall_threshold),
            position_config: options.position,
            processing_state: ProcessingState::Idle,
            current_index: None,
            error: None,
            icy: IcyMetadata::default(),
            audio_session_id,
            lazy_preparation: options.engine.lazy_preparation,
            pending_load: PendingSlot::new("load"),
            pending_play: PendingSlot::new("play"),
            pending_seek: PendingSlot::new("seek"),
            deferred_attributes: None,
            last_playlist_len: 0,
            buffer_watch_requested: false,
        }
    }

    pub fn processing_state(&self) -> ProcessingState {
        self.processing_state
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn is_disposed(&self) -> bool {
        self.engine.is_none()
    }

    pub fn sources(&self) -> &AudioSourceTree {
        &self.sources
    }

    /// Position reported for the next sample
    ///
    /// While a seek is in flight its target stands in for the engine
    /// position, which may still point at the old location.
    fn current_position_us(&self) -> u64 {
        let Some(engine) = self.engine.as_ref() else {
            return self.position.update_position_us();
        };
        if self.processing_state.is_unprepared() {
            return engine.current_position_us();
        }
        self.position
            .seek_target_us()
            .unwrap_or_else(|| engine.current_position_us())
    }

    fn duration_us(&self) -> Option<u64> {
        if self.processing_state.is_unprepared() {
            return None;
        }
        self.engine.as_ref().and_then(|engine| engine.duration_us())
    }

    fn play_when_ready(&self) -> bool {
        self.engine.as_ref().is_some_and(|engine| engine.play_when_ready())
    }

    fn sample_position(&mut self) {
        let position = self.current_position_us();
        self.position.sample(position);
    }

    fn sample_position_if_changed(&mut self) -> bool {
        let advancing = self.play_when_ready() && self.processing_state == ProcessingState::Ready;
        let position = self.current_position_us();
        self.position.sample_if_changed(position, advancing)
    }

    /// Build a snapshot of the current state, refreshing the buffered position
    pub fn snapshot(&mut self) -> PlaybackSnapshot {
        let buffered = self.engine.as_ref().map_or(0, |engine| engine.buffered_position_us());
        self.position.set_buffered_position_us(buffered);
        let update_position_us = self.position.update_position_us();

        PlaybackSnapshot {
            processing_state: self.processing_state,
            update_position_us,
            update_time_ms: self.position.update_time_ms(),
            buffered_position_us: buffered.max(update_position_us),
            duration_us: self.duration_us(),
            current_index: self.current_index,
            audio_session_id: self.audio_session_id,
            icy_metadata: self.icy.clone(),
            error_code: self.error.as_ref().map(|(code, _)| *code),
            error_message: self.error.as_ref().map(|(_, message)| message.clone()),
        }
    }

    fn enqueue_snapshot(&mut self) {
        let snapshot = self.snapshot();
        self.broadcaster.enqueue(snapshot);
    }

    fn broadcast_now(&mut self) {
        let snapshot = self.snapshot();
        self.broadcaster.broadcast_now(snapshot);
    }

    /// Send whatever snapshot command handling left pending
    fn flush_events(&mut self) {
        self.broadcaster.flush();
    }

    fn clear_error(&mut self) {
        self.error = None;
    }

    /// Report `error` out of band, latch it and fail a pending load
    fn send_error(&mut self, error: PlayerError, switch_to_idle: bool) {
        let code = error.code();
        let message = error.message();
        self.broadcaster.send_error(code, &message, error.details().index);
        self.error = Some((code, message));
        if switch_to_idle {
            self.processing_state = ProcessingState::Idle;
        }
        self.broadcast_now();
        self.pending_load.settle(Err(error));
    }

    fn abort_existing_connection(&mut self, switch_to_idle: bool) {
        info!("Aborting in-flight load");
        self.send_error(PlayerError::AbortedConnection, switch_to_idle);
    }

    /// Settle an in-flight seek as satisfied
    fn abort_seek(&mut self) {
        if self.pending_seek.settle(Ok(CommandResponse::empty())) {
            debug!("Superseded pending seek");
            self.position.set_seek_target_us(None);
        }
    }

    fn complete_seek(&mut self) {
        self.position.set_seek_target_us(None);
        self.pending_seek.settle(Ok(CommandResponse::empty()));
    }

    fn settle_load(&mut self) {
        if self.pending_load.is_pending() {
            let duration_ms = self.duration_us().map(micros_to_millis);
            info!("Load complete (duration {:?} ms)", duration_ms);
            self.pending_load.settle(Ok(CommandResponse::Loaded { duration_ms }));
        }
    }

    fn flush_deferred_attributes(&mut self) {
        if let (Some(attributes), Some(engine)) = (self.deferred_attributes.take(), self.engine.as_mut()) {
            debug!("Applying deferred audio attributes {:?}", attributes);
            engine.set_audio_attributes(attributes);
        }
    }

    /// Re-read the engine's index; true if it moved
    fn update_current_index(&mut self) -> bool {
        let Some(engine) = self.engine.as_ref() else {
            return false;
        };
        let index = Some(engine.current_media_item_index());
        if index != self.current_index {
            self.current_index = index;
            return true;
        }
        false
    }

    /// Whether the buffered-position poller should be (re)started
    pub fn take_buffer_watch_request(&mut self) -> bool {
        std::mem::take(&mut self.buffer_watch_requested)
    }

    /// One buffered-position poll; returns the delay until the next one
    pub fn poll_buffered_position(&mut self) -> Option<Duration> {
        let (buffered, state, play_when_ready) = {
            let engine = self.engine.as_ref()?;
            (engine.buffered_position_us(), engine.playback_state(), engine.play_when_ready())
        };
        if buffered != self.position.buffered_position_us() {
            // The snapshot refreshes the stored buffered position
            self.broadcast_now();
        }
        self.position_config.poll_interval(state, play_when_ready)
    }

    pub fn stall_sample_interval(&self) -> Duration {
        self.position_config.stall_sample_interval()
    }

    /// True while the render clock should be advancing
    pub fn stall_observing(&self) -> bool {
        self.processing_state == ProcessingState::Ready && self.play_when_ready()
    }

    /// One render-clock sample for the stall detector
    pub fn stall_tick(&mut self) {
        if !self.stall_observing() {
            self.stall.reset();
            return;
        }
        let Some(render_us) = self.engine.as_ref().map(|engine| engine.render_position_us()) else {
            return;
        };
        if self.stall.observe(render_us) {
            debug!("Render clock stalled or resumed at {}us, re-sampling", render_us);
            if self.sample_position_if_changed() {
                self.broadcast_now();
            }
        }
    }

    /// Release everything and close the event stream; idempotent
    pub fn dispose(&mut self) {
        if self.engine.is_none() && self.broadcaster.is_closed() {
            return;
        }
        info!("Disposing player");

        if self.processing_state == ProcessingState::Loading {
            self.abort_existing_connection(true);
        }
        self.pending_play.settle(Ok(CommandResponse::empty()));
        self.abort_seek();
        self.pending_load.settle(Err(PlayerError::AbortedConnection));

        self.sources.clear();
        self.effects.release_all();
        self.stall.reset();
        self.buffer_watch_requested = false;
        self.deferred_attributes = None;

        if let Some(mut engine) = self.engine.take() {
            engine.release();
            self.processing_state = ProcessingState::Idle;
            self.broadcast_now();
        }
        self.broadcaster.close();
    }
}
