//! Playback control
//!
//! - [`controller`]: the state machine between host commands and engine callbacks
//! - [`broadcaster`]: coalescing snapshot delivery
//! - [`position`]: position sampling, poll cadence and stall detection
//! - [`pending`]: per-class outstanding command results
//! - [`service`]: the task that owns a controller and serializes its inputs

pub mod broadcaster;
pub mod command;
pub mod controller;
pub mod pending;
pub mod position;
pub mod service;

pub use broadcaster::EventBroadcaster;
pub use command::{CommandEnvelope, CommandResponse, PlayerCommand};
pub use controller::{ControllerOptions, PlaybackController};
pub use pending::{PendingSlot, Responder};
pub use position::{PositionConfig, PositionTracker, StallDetector};
pub use service::{spawn_player, start_player, EventStream, PlayerHandle, RunningPlayer};
