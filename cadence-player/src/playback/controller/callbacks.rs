use cadence_common::ProcessingState;
use tracing::{debug, error, trace, warn};

use super::PlaybackController;
use crate::engine::{DiscontinuityReason, EngineError, EngineErrorKind, EngineEvent, EngineState, MetadataEntry};
use crate::error::PlayerError;
use crate::playback::command::CommandResponse;

impl PlaybackController {
    /// Fold one engine callback into the controller state
    ///
    /// Callbacks are not wrapped by a command, so every state change made here
    /// is broadcast immediately.
    pub fn on_engine_event(&mut self, event: EngineEvent) {
        if self.engine.is_none() {
            trace!("Ignoring engine event after dispose: {:?}", event);
            return;
        }

        match event {
            EngineEvent::PlaybackStateChanged(state) => self.on_playback_state_changed(state),
            EngineEvent::PositionDiscontinuity { reason } => self.on_position_discontinuity(reason),
            EngineEvent::TimelineChanged => self.on_timeline_changed(),
            EngineEvent::PlayerError(error) => self.on_player_error(error),
            EngineEvent::TracksChanged(entries) => self.on_metadata(entries),
            EngineEvent::Metadata(entries) => self.on_metadata(entries),
            EngineEvent::AudioSessionIdChanged(session_id) => self.on_audio_session_id_changed(session_id),
        }
    }

    fn on_playback_state_changed(&mut self, state: EngineState) {
        debug!("Engine state {:?} (processing state {})", state, self.processing_state);
        self.stall.reset();

        match state {
            EngineState::Ready => {
                if self.play_when_ready() {
                    self.sample_position();
                }
                self.processing_state = ProcessingState::Ready;
                self.clear_error();
                self.broadcast_now();

                self.settle_load();
                self.flush_deferred_attributes();
                if self.pending_seek.is_pending() {
                    self.complete_seek();
                }
                self.buffer_watch_requested = true;
            }
            EngineState::Buffering => {
                self.sample_position_if_changed();
                if !matches!(self.processing_state, ProcessingState::Buffering | ProcessingState::Loading) {
                    self.processing_state = ProcessingState::Buffering;
                    self.clear_error();
                    self.broadcast_now();
                }
                self.buffer_watch_requested = true;
            }
            EngineState::Ended => {
                if self.processing_state != ProcessingState::Completed {
                    self.sample_position();
                    self.processing_state = ProcessingState::Completed;
                    self.clear_error();
                    self.broadcast_now();
                }
                self.settle_load();
                self.flush_deferred_attributes();
                self.pending_play.settle(Ok(CommandResponse::empty()));
                // A seek past the end never reaches ready
                if self.pending_seek.is_pending() {
                    self.complete_seek();
                }
            }
            EngineState::Idle => {}
        }
    }

    fn on_position_discontinuity(&mut self, reason: DiscontinuityReason) {
        trace!("Position discontinuity: {:?}", reason);
        self.sample_position();
        if reason.changes_index() {
            self.update_current_index();
        }
        self.broadcast_now();
    }

    fn on_timeline_changed(&mut self) {
        if self.update_current_index() {
            self.broadcast_now();
        }

        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let count = engine.media_item_count();

        if engine.playback_state() == EngineState::Ended {
            // Best effort: a rejected corrective seek is only logged
            let index = engine.current_media_item_index();
            let recovery = if engine.play_when_ready() {
                // Wrap to the first item when the playlist went from empty to
                // filled, or when the ended index lies past the end (the list
                // shrank under it). Only an index still in range advances.
                if count > 0 && (self.last_playlist_len == 0 || index >= count) {
                    debug!("Playlist refilled after end, restarting at item 0");
                    engine.seek_to(0, Some(0))
                } else if engine.has_next_media_item() {
                    debug!("Playlist grew after end, advancing to next item");
                    engine.seek_to_next_media_item()
                } else {
                    Ok(())
                }
            } else if index < count {
                engine.seek_to(index, Some(0))
            } else {
                Ok(())
            };
            if let Err(e) = recovery {
                warn!("End-of-playlist recovery seek failed: {}", e);
            }
        }

        self.last_playlist_len = count;
    }

    fn on_player_error(&mut self, engine_error: EngineError) {
        match engine_error.kind {
            EngineErrorKind::Source => error!("Source error: {}", engine_error.message),
            EngineErrorKind::Renderer => error!("Renderer error: {}", engine_error.message),
            EngineErrorKind::Unexpected => error!("Unexpected engine error: {}", engine_error.message),
            EngineErrorKind::Other(code) => error!("Engine error {}: {}", code, engine_error.message),
            EngineErrorKind::Rejected => error!("Engine rejected a call: {}", engine_error.message),
        }
        let error = PlayerError::from_engine(engine_error, self.current_index);
        self.send_error(error, true);
    }

    fn on_metadata(&mut self, entries: Vec<MetadataEntry>) {
        for entry in entries {
            match entry {
                MetadataEntry::IcyInfo(info) => {
                    debug!("ICY info: {:?}", info.title);
                    self.icy.info = Some(info);
                    self.broadcast_now();
                }
                MetadataEntry::IcyHeaders(headers) => {
                    debug!("ICY headers: {:?}", headers.name);
                    self.icy.headers = Some(headers);
                    self.broadcast_now();
                }
                MetadataEntry::Other(kind) => trace!("Ignoring metadata entry {}", kind),
            }
        }
    }

    fn on_audio_session_id_changed(&mut self, session_id: Option<i32>) {
        debug!("Audio session id changed to {:?}", session_id);
        self.audio_session_id = session_id;
        self.effects.on_session_changed(session_id);
        self.enqueue_snapshot();
        self.flush_events();
    }
}
