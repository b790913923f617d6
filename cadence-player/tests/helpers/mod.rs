//! Shared fixtures for controller integration tests
//!
//! The harness drives a [`PlaybackController`] synchronously: commands are
//! handled inline, engine callbacks are injected by hand, and results are
//! read back with `try_recv` on the command's oneshot receiver.

#![allow(dead_code)]

use cadence_common::events::{PlaybackSnapshot, PlayerEvent};
use cadence_player::effects::EffectDescriptor;
use cadence_player::engine::{EngineEvent, EngineState, SimulatedEffects, SimulatedEngine};
use cadence_player::playback::{CommandResponse, ControllerOptions, PlaybackController, PlayerCommand};
use cadence_player::Result;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

pub const SESSION_ID: i32 = 42;

pub struct Harness {
    pub controller: PlaybackController,
    pub engine: SimulatedEngine,
    pub effects: SimulatedEffects,
    pub events: mpsc::UnboundedReceiver<PlayerEvent>,
}

impl Harness {
    /// Passive engine with no audio session
    pub fn new() -> Self {
        Self::build(SimulatedEngine::new(), Vec::new())
    }

    /// Passive engine with an audio session and the given effects configured
    pub fn with_effects(effects: Vec<EffectDescriptor>) -> Self {
        let engine = SimulatedEngine::new();
        engine.set_session_id(Some(SESSION_ID));
        Self::build(engine, effects)
    }

    fn build(engine: SimulatedEngine, effect_descriptors: Vec<EffectDescriptor>) -> Self {
        let effects = SimulatedEffects::new();
        let (tx, events) = mpsc::unbounded_channel();
        let options = ControllerOptions {
            effects: effect_descriptors,
            shuffle_seed: Some(7),
            ..Default::default()
        };
        let controller = PlaybackController::new(Box::new(engine.clone()), Box::new(effects.clone()), options, tx);
        Self { controller, engine, effects, events }
    }

    /// Handle a command and hand back its result slot
    pub fn command(&mut self, command: PlayerCommand) -> oneshot::Receiver<Result<CommandResponse>> {
        let (tx, rx) = oneshot::channel();
        self.controller.handle_command(command, tx);
        rx
    }

    /// Handle a command that must settle synchronously
    pub fn run(&mut self, command: PlayerCommand) -> Result<CommandResponse> {
        let mut rx = self.command(command);
        settled(&mut rx).expect("command did not settle synchronously")
    }

    /// Move the simulated engine into `state` and deliver the matching callback
    pub fn engine_state(&mut self, state: EngineState) {
        self.engine.set_state(state);
        self.controller.on_engine_event(EngineEvent::PlaybackStateChanged(state));
    }

    pub fn engine_event(&mut self, event: EngineEvent) {
        self.controller.on_engine_event(event);
    }

    /// Load `children` and let the engine report ready
    pub fn load_ready(&mut self, children: Vec<Value>) -> Result<CommandResponse> {
        let mut rx = self.command(load(children, None));
        self.engine_state(EngineState::Buffering);
        self.engine_state(EngineState::Ready);
        settled(&mut rx).expect("load did not settle on ready")
    }

    pub fn drain(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn snapshots(&mut self) -> Vec<PlaybackSnapshot> {
        self.drain().iter().filter_map(|e| e.snapshot().cloned()).collect()
    }

    pub fn last_snapshot(&mut self) -> Option<PlaybackSnapshot> {
        self.snapshots().pop()
    }
}

/// Result of a command if it has settled; panics if the slot was dropped
pub fn settled(rx: &mut oneshot::Receiver<Result<CommandResponse>>) -> Option<Result<CommandResponse>> {
    match rx.try_recv() {
        Ok(result) => Some(result),
        Err(oneshot::error::TryRecvError::Empty) => None,
        Err(oneshot::error::TryRecvError::Closed) => panic!("result slot dropped without settling"),
    }
}

pub fn progressive(id: &str) -> Value {
    json!({"id": id, "type": "progressive", "uri": format!("https://example.com/{}.mp3", id)})
}

pub fn silence(id: &str, duration_us: u64) -> Value {
    json!({"id": id, "type": "silence", "duration": duration_us})
}

pub fn concatenating(id: &str, children: Vec<Value>, shuffle_order: Vec<usize>) -> Value {
    json!({"id": id, "type": "concatenating", "children": children, "shuffleOrder": shuffle_order})
}

pub fn looping(id: &str, child: Value, count: usize) -> Value {
    json!({"id": id, "type": "looping", "child": child, "count": count})
}

/// Top-level playlist descriptor as sent with `load`
pub fn playlist(children: Vec<Value>) -> Value {
    json!({"id": "root", "type": "concatenating", "children": children})
}

pub fn load(children: Vec<Value>, initial_index: Option<usize>) -> PlayerCommand {
    PlayerCommand::Load {
        audio_source: playlist(children),
        initial_position_us: None,
        initial_index,
    }
}
