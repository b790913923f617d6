//! # Cadence Common Library
//!
//! Shared code for the cadence player crates including:
//! - Host-facing event types (`PlayerEvent`, `PlaybackSnapshot`)
//! - Configuration file resolution and TOML loading
//! - Wall-clock helpers used for position sampling

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{PlaybackSnapshot, PlayerEvent, ProcessingState};
