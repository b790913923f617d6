//! # Cadence Player Library (cadence-player)
//!
//! Playback control layer between a host application and an audio engine.
//!
//! **Purpose:** Accept asynchronous playback commands, drive the engine,
//! resolve composable audio source trees, and push one coherent playback
//! snapshot stream back to the host.
//!
//! **Architecture:** A single [`playback::PlaybackController`] owned by one
//! tokio task; host commands and engine callbacks are serialized onto it.

pub mod api;
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod playback;
pub mod source;

pub use error::{PlayerError, Result};
pub use playback::{start_player, PlayerHandle, RunningPlayer};
