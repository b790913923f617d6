//! Player task and its handle
//!
//! One tokio task owns the [`PlaybackController`]. Host commands, engine
//! callbacks, the buffered-position poll and the stall sampler all funnel
//! into that task's `select!` loop, so controller state is only ever touched
//! from a single context.

use cadence_common::events::PlayerEvent;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, info_span, Instrument};

use super::command::{CommandEnvelope, CommandResponse, PlayerCommand};
use super::controller::{ControllerOptions, PlaybackController};
use crate::effects::{EffectFactory, EqualizerParameters};
use crate::engine::{AudioAttributes, AudioEngine, EngineEvent, LoopMode};
use crate::error::{PlayerError, Result};

/// Commands queued ahead of the player task before senders wait
const COMMAND_QUEUE_DEPTH: usize = 64;

/// Host-facing stream of snapshots and error events; ends after dispose
pub type EventStream = UnboundedReceiverStream<PlayerEvent>;

/// Cloneable sender side of a running player
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    id: String,
    commands: mpsc::Sender<CommandEnvelope>,
}

impl PlayerHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue one command and return the receiver its result settles into
    ///
    /// Commands are processed in the order `submit` returns, which lets a
    /// transport keep arrival order while awaiting results concurrently.
    pub async fn submit(&self, command: PlayerCommand) -> Result<oneshot::Receiver<Result<CommandResponse>>> {
        let (tx, rx) = oneshot::channel();
        self.commands.send((command, tx)).await.map_err(|_| PlayerError::Disposed)?;
        Ok(rx)
    }

    /// Send one command and wait for its result
    ///
    /// A player whose task has already exited answers `Disposed`.
    pub async fn call(&self, command: PlayerCommand) -> Result<CommandResponse> {
        let rx = self.submit(command).await?;
        rx.await.map_err(|_| PlayerError::Disposed)?
    }

    async fn call_empty(&self, command: PlayerCommand) -> Result<()> {
        self.call(command).await.map(|_| ())
    }

    /// Load a playlist; resolves with the duration in ms once the engine is ready
    pub async fn load(
        &self,
        audio_source: serde_json::Value,
        initial_position_us: Option<u64>,
        initial_index: Option<usize>,
    ) -> Result<Option<u64>> {
        match self.call(PlayerCommand::Load { audio_source, initial_position_us, initial_index }).await? {
            CommandResponse::Loaded { duration_ms } => Ok(duration_ms),
            _ => Ok(None),
        }
    }

    /// Start playback; resolves when playback next pauses or completes
    pub async fn play(&self) -> Result<()> {
        self.call_empty(PlayerCommand::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.call_empty(PlayerCommand::Pause).await
    }

    /// Resolves once the engine reports the seek as done
    pub async fn seek(&self, position_us: Option<u64>, index: Option<usize>) -> Result<()> {
        self.call_empty(PlayerCommand::Seek { position_us, index }).await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.call_empty(PlayerCommand::SetVolume(volume)).await
    }

    pub async fn set_speed(&self, speed: f32) -> Result<()> {
        self.call_empty(PlayerCommand::SetSpeed(speed)).await
    }

    pub async fn set_pitch(&self, pitch: f32) -> Result<()> {
        self.call_empty(PlayerCommand::SetPitch(pitch)).await
    }

    pub async fn set_loop_mode(&self, mode: LoopMode) -> Result<()> {
        self.call_empty(PlayerCommand::SetLoopMode(mode)).await
    }

    pub async fn set_shuffle_mode_enabled(&self, enabled: bool) -> Result<()> {
        self.call_empty(PlayerCommand::SetShuffleModeEnabled(enabled)).await
    }

    pub async fn set_audio_attributes(&self, attributes: AudioAttributes) -> Result<()> {
        self.call_empty(PlayerCommand::SetAudioAttributes(attributes)).await
    }

    pub async fn equalizer_parameters(&self) -> Result<EqualizerParameters> {
        match self.call(PlayerCommand::EqualizerGetParameters).await? {
            CommandResponse::EqualizerParameters { parameters } => Ok(parameters),
            other => Err(PlayerError::IllegalState(format!("unexpected response {:?}", other))),
        }
    }

    pub async fn dispose(&self) -> Result<()> {
        self.call_empty(PlayerCommand::Dispose).await
    }
}

/// Everything a host needs from a freshly started player
pub struct RunningPlayer {
    pub handle: PlayerHandle,
    pub events: EventStream,
    pub task: JoinHandle<()>,
}

/// Build a controller around `engine` and start its task
///
/// `engine_events` must be the receiving end of the channel the engine
/// emits its callbacks on.
pub fn start_player(
    engine: Box<dyn AudioEngine>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    effects: Box<dyn EffectFactory>,
    options: ControllerOptions,
    id: impl Into<String>,
) -> RunningPlayer {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let controller = PlaybackController::new(engine, effects, options, events_tx);
    let (handle, task) = spawn_player(controller, engine_events, id);

    RunningPlayer {
        handle,
        events: UnboundedReceiverStream::new(events_rx),
        task,
    }
}

/// Move an existing controller onto its own task
pub fn spawn_player(
    controller: PlaybackController,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    id: impl Into<String>,
) -> (PlayerHandle, JoinHandle<()>) {
    let id = id.into();
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let span = info_span!("player", id = %id);
    let task = tokio::spawn(run(controller, rx, engine_events).instrument(span));

    (PlayerHandle { id, commands: tx }, task)
}

async fn run(
    mut controller: PlaybackController,
    mut commands: mpsc::Receiver<CommandEnvelope>,
    mut engine_events: mpsc::UnboundedReceiver<EngineEvent>,
) {
    info!("Player task started");

    let buffer_watch = time::sleep(std::time::Duration::ZERO);
    tokio::pin!(buffer_watch);
    let mut watching = false;

    let mut stall_ticker = time::interval(controller.stall_sample_interval());
    stall_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut engine_open = true;

    loop {
        if controller.take_buffer_watch_request() {
            buffer_watch.as_mut().reset(Instant::now());
            watching = true;
        }
        let observing = controller.stall_observing();

        tokio::select! {
            command = commands.recv() => match command {
                Some((command, reply)) => {
                    let disposing = matches!(command, PlayerCommand::Dispose);
                    controller.handle_command(command, reply);
                    if disposing {
                        break;
                    }
                }
                None => {
                    info!("All player handles dropped");
                    controller.dispose();
                    break;
                }
            },
            event = engine_events.recv(), if engine_open => match event {
                Some(event) => controller.on_engine_event(event),
                None => {
                    debug!("Engine event channel closed");
                    engine_open = false;
                }
            },
            () = &mut buffer_watch, if watching => {
                match controller.poll_buffered_position() {
                    Some(delay) => buffer_watch.as_mut().reset(Instant::now() + delay),
                    None => watching = false,
                }
            }
            _ = stall_ticker.tick(), if observing => controller.stall_tick(),
        }
    }

    // Commands that raced the dispose still get an answer
    commands.close();
    while let Ok((command, reply)) = commands.try_recv() {
        controller.handle_command(command, reply);
    }

    info!("Player task stopped");
}
