use cadence_common::ProcessingState;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::PlaybackController;
use crate::engine::{AudioAttributes, PlaybackParameters};
use crate::error::{PlayerError, Result};
use crate::playback::command::{CommandResponse, PlayerCommand};
use crate::playback::pending::Responder;
use crate::source::descriptor::{
    descriptor_children, descriptor_id, descriptor_lazy_preparation, descriptor_shuffle_order, descriptor_type,
};
use crate::source::{MediaSource, NodeId, ShuffleOrder};

/// Playlist edit shared by the three mutation commands
enum PlaylistEdit {
    Insert { index: usize, sources: Vec<MediaSource> },
    Remove { start: usize, end: usize },
    Move { from: usize, to: usize },
}

impl PlaylistEdit {
    fn resulting_len(&self, len: usize) -> Result<usize> {
        match self {
            PlaylistEdit::Insert { sources, .. } => Ok(len + sources.len()),
            PlaylistEdit::Remove { start, end } => {
                if start > end || *end > len {
                    return Err(PlayerError::InvalidCommandArgument(format!(
                        "range {}..{} out of bounds for {} items",
                        start, end, len
                    )));
                }
                Ok(len - (end - start))
            }
            PlaylistEdit::Move { .. } => Ok(len),
        }
    }
}

impl PlaybackController {
    /// Run one host command and settle `reply` (now or from a later callback)
    ///
    /// Whatever snapshot the command enqueued is flushed before returning, so
    /// each command produces at most one broadcast of its own.
    pub fn handle_command(&mut self, command: PlayerCommand, reply: Responder<CommandResponse>) {
        let name = command.name();
        if self.engine.is_none() && command != PlayerCommand::Dispose {
            debug!("Rejecting {} after dispose", name);
            let _ = reply.send(Err(PlayerError::Disposed));
            return;
        }
        debug!("Handling {}", name);

        match command {
            PlayerCommand::Load { audio_source, initial_position_us, initial_index } => {
                self.load(&audio_source, initial_position_us, initial_index, reply)
            }
            PlayerCommand::Play => self.play(reply),
            PlayerCommand::Seek { position_us, index } => self.seek(position_us, index, reply),
            PlayerCommand::Dispose => {
                self.dispose();
                let _ = reply.send(Ok(CommandResponse::empty()));
            }
            command => {
                let result = self.execute(command);
                if let Err(e) = &result {
                    warn!("{} failed: {}", name, e);
                }
                let _ = reply.send(result);
            }
        }

        self.flush_events();
    }

    fn execute(&mut self, command: PlayerCommand) -> Result<CommandResponse> {
        match command {
            PlayerCommand::Pause => self.pause()?,
            PlayerCommand::SetVolume(volume) => self.engine_mut()?.set_volume(volume),
            PlayerCommand::SetSpeed(speed) => self.set_speed(speed)?,
            PlayerCommand::SetPitch(pitch) => self.set_pitch(pitch)?,
            PlayerCommand::SetSkipSilence(enabled) => self.engine_mut()?.set_skip_silence_enabled(enabled),
            PlayerCommand::SetLoopMode(mode) => self.engine_mut()?.set_repeat_mode(mode),
            PlayerCommand::SetShuffleModeEnabled(enabled) => self.engine_mut()?.set_shuffle_mode_enabled(enabled),
            PlayerCommand::SetShuffleOrder { audio_source } => self.set_shuffle_order(&audio_source)?,
            PlayerCommand::InsertAll { id, index, children, shuffle_order } => {
                let sources = self.sources.resolve_all(&children, &mut self.shuffle)?;
                self.edit_playlist(&id, PlaylistEdit::Insert { index, sources }, &shuffle_order)?
            }
            PlayerCommand::RemoveRange { id, start, end, shuffle_order } => {
                self.edit_playlist(&id, PlaylistEdit::Remove { start, end }, &shuffle_order)?
            }
            PlayerCommand::Move { id, from, to, shuffle_order } => {
                self.edit_playlist(&id, PlaylistEdit::Move { from, to }, &shuffle_order)?
            }
            PlayerCommand::SetAudioAttributes(attributes) => self.set_audio_attributes(attributes)?,
            PlayerCommand::SetAutomaticallyWaitsToMinimizeStalling(_)
            | PlayerCommand::SetCanUseNetworkResourcesForLiveStreamingWhilePaused(_)
            | PlayerCommand::SetPreferredPeakBitRate(_) => {}
            PlayerCommand::AudioEffectSetEnabled { type_name, enabled } => {
                self.effects.set_enabled(&type_name, enabled)?
            }
            PlayerCommand::LoudnessEnhancerSetTargetGain(gain) => self.effects.set_target_gain(gain)?,
            PlayerCommand::EqualizerGetParameters => {
                let parameters = self.effects.equalizer_parameters()?;
                return Ok(CommandResponse::EqualizerParameters { parameters });
            }
            PlayerCommand::EqualizerBandSetGain { band, gain } => self.effects.set_band_gain(band, gain)?,
            command @ (PlayerCommand::Load { .. }
            | PlayerCommand::Play
            | PlayerCommand::Seek { .. }
            | PlayerCommand::Dispose) => {
                return Err(PlayerError::IllegalState(format!("{} settles asynchronously", command.name())));
            }
        }
        Ok(CommandResponse::empty())
    }

    fn engine_mut(&mut self) -> Result<&mut Box<dyn crate::engine::AudioEngine>> {
        self.engine.as_mut().ok_or(PlayerError::Disposed)
    }

    fn load(
        &mut self,
        audio_source: &Value,
        initial_position_us: Option<u64>,
        initial_index: Option<usize>,
        reply: Responder<CommandResponse>,
    ) {
        // Resolve first: a bad descriptor fails the command and leaves state alone
        let (root_id, sources, order, lazy_preparation) = match self.resolve_playlist(audio_source, initial_index) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("load failed: {}", e);
                let _ = reply.send(Err(e));
                return;
            }
        };

        let index = initial_index.unwrap_or(0);
        info!("Loading {} items at index {}", sources.len(), index);
        self.current_index = Some(index);

        match self.processing_state {
            ProcessingState::Idle => {}
            ProcessingState::Loading => {
                self.abort_existing_connection(false);
                self.stop_engine();
            }
            _ => self.stop_engine(),
        }

        self.pending_load.install(reply, Err(PlayerError::AbortedConnection));
        self.sample_position();
        self.processing_state = ProcessingState::Loading;
        self.clear_error();
        self.enqueue_snapshot();

        self.sources.retain_reachable(&sources);
        self.sources.set_root_id(root_id);

        if let Some(engine) = self.engine.as_mut() {
            engine.set_media_sources(sources, index, initial_position_us, lazy_preparation);
            engine.set_shuffle_order(order);
            engine.prepare();
        }
    }

    fn resolve_playlist(
        &mut self,
        audio_source: &Value,
        initial_index: Option<usize>,
    ) -> Result<(Option<NodeId>, Vec<MediaSource>, ShuffleOrder, bool)> {
        let children = descriptor_children(audio_source)?;
        let explicit = descriptor_shuffle_order(audio_source)?;
        let lazy_preparation = descriptor_lazy_preparation(audio_source)?.unwrap_or(self.lazy_preparation);
        let sources = self.sources.resolve_all(&children, &mut self.shuffle)?;
        let order = self.shuffle.decode(&explicit, sources.len())?;

        if let Some(index) = initial_index {
            if !sources.is_empty() && index >= sources.len() {
                return Err(PlayerError::InvalidCommandArgument(format!(
                    "initial index {} out of range for {} items",
                    index,
                    sources.len()
                )));
            }
        }

        Ok((descriptor_id(audio_source).ok(), sources, order, lazy_preparation))
    }

    fn stop_engine(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.stop();
        }
    }

    fn play(&mut self, reply: Responder<CommandResponse>) {
        let Some(engine) = self.engine.as_mut() else {
            let _ = reply.send(Err(PlayerError::Disposed));
            return;
        };
        if engine.play_when_ready() {
            let _ = reply.send(Ok(CommandResponse::empty()));
            return;
        }
        engine.set_play_when_ready(true);

        self.pending_play.install(reply, Ok(CommandResponse::empty()));
        self.stall.reset();
        self.sample_position();
        self.enqueue_snapshot();

        // Ended media counts as playing from the caller's side
        if self.processing_state == ProcessingState::Completed {
            self.pending_play.settle(Ok(CommandResponse::empty()));
        }
    }

    fn pause(&mut self) -> Result<()> {
        let engine = self.engine_mut()?;
        if !engine.play_when_ready() {
            return Ok(());
        }
        engine.set_play_when_ready(false);

        self.stall.reset();
        self.sample_position();
        self.enqueue_snapshot();
        self.pending_play.settle(Ok(CommandResponse::empty()));
        Ok(())
    }

    fn seek(&mut self, position_us: Option<u64>, index: Option<usize>, reply: Responder<CommandResponse>) {
        if self.processing_state.is_unprepared() {
            debug!("Nothing to seek in while {}", self.processing_state);
            let _ = reply.send(Ok(CommandResponse::empty()));
            return;
        }

        self.abort_seek();
        self.position.set_seek_target_us(position_us);
        self.pending_seek.install(reply, Ok(CommandResponse::empty()));

        let current_index = self.current_index;
        let result = match self.engine.as_mut() {
            Some(engine) => {
                let index = index.unwrap_or_else(|| engine.current_media_item_index());
                engine.seek_to(index, position_us).map_err(|e| PlayerError::from_engine(e, current_index))
            }
            None => Err(PlayerError::Disposed),
        };

        if let Err(e) = result {
            warn!("seek failed: {}", e);
            self.position.set_seek_target_us(None);
            self.pending_seek.settle(Err(e));
        }
    }

    fn set_speed(&mut self, speed: f32) -> Result<()> {
        let engine = self.engine_mut()?;
        let parameters = engine.playback_parameters();
        if parameters.speed == speed {
            return Ok(());
        }
        engine.set_playback_parameters(PlaybackParameters { speed, ..parameters });
        let playing = engine.play_when_ready();

        if playing {
            self.sample_position();
        }
        self.enqueue_snapshot();
        Ok(())
    }

    fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        let engine = self.engine_mut()?;
        let parameters = engine.playback_parameters();
        if parameters.pitch == pitch {
            return Ok(());
        }
        engine.set_playback_parameters(PlaybackParameters { pitch, ..parameters });
        self.enqueue_snapshot();
        Ok(())
    }

    fn set_audio_attributes(&mut self, attributes: AudioAttributes) -> Result<()> {
        if self.processing_state == ProcessingState::Loading {
            debug!("Deferring audio attributes until loading ends");
            self.deferred_attributes = Some(attributes);
            return Ok(());
        }
        self.engine_mut()?.set_audio_attributes(attributes);
        Ok(())
    }

    /// Apply new shuffle orders down a descriptor tree
    ///
    /// The loaded top-level playlist lives in the engine; nested
    /// concatenations hold their own order.
    fn set_shuffle_order(&mut self, descriptor: &Value) -> Result<()> {
        let id = descriptor_id(descriptor)?;
        match descriptor_type(descriptor)? {
            "concatenating" => {
                let explicit = descriptor_shuffle_order(descriptor)?;
                if self.sources.root_id() == Some(id.as_str()) {
                    let Some(engine) = self.engine.as_mut() else {
                        return Err(PlayerError::Disposed);
                    };
                    let order = self.shuffle.decode(&explicit, engine.media_item_count())?;
                    engine.set_shuffle_order(order);
                } else {
                    let node = self.sources.concatenating(&id)?;
                    let composite = node
                        .as_concatenating()
                        .ok_or_else(|| PlayerError::InvalidCommandArgument(format!("{} is not a concatenation", id)))?;
                    let order = self.shuffle.decode(&explicit, composite.len())?;
                    composite.set_shuffle_order(order)?;
                }
                for child in descriptor_children(descriptor)? {
                    self.set_shuffle_order(&child)?;
                }
            }
            "looping" => {
                if let Some(child) = descriptor.get("child") {
                    self.set_shuffle_order(child)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Apply one edit together with the matching shuffle order
    ///
    /// An empty `id` edits the engine playlist; any other id names a cached
    /// concatenation, which swaps children and order under one lock.
    fn edit_playlist(&mut self, id: &str, edit: PlaylistEdit, explicit_order: &[usize]) -> Result<()> {
        let current_index = self.current_index;

        if id.is_empty() {
            let Some(engine) = self.engine.as_mut() else {
                return Err(PlayerError::Disposed);
            };
            let len = edit.resulting_len(engine.media_item_count())?;
            let order = self.shuffle.decode(explicit_order, len)?;
            let result = match edit {
                PlaylistEdit::Insert { index, sources } => engine.add_media_sources(index, sources, order),
                PlaylistEdit::Remove { start, end } => engine.remove_media_items(start, end, order),
                PlaylistEdit::Move { from, to } => engine.move_media_item(from, to, order),
            };
            return result.map_err(|e| PlayerError::from_engine(e, current_index));
        }

        let node = self.sources.concatenating(id)?;
        let composite = node
            .as_concatenating()
            .ok_or_else(|| PlayerError::InvalidCommandArgument(format!("{} is not a concatenation", id)))?;
        let len = edit.resulting_len(composite.len())?;
        let order = self.shuffle.decode(explicit_order, len)?;
        match edit {
            PlaylistEdit::Insert { index, sources } => composite.insert_all(index, sources, order),
            PlaylistEdit::Remove { start, end } => composite.remove_range(start, end, order),
            PlaylistEdit::Move { from, to } => composite.move_child(from, to, order),
        }
    }
}
