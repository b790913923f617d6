//! Host-facing transport
//!
//! [`requests`] maps method-tagged JSON onto [`crate::playback::PlayerCommand`];
//! [`stdio`] runs a player over newline-delimited JSON.

pub mod requests;
pub mod stdio;

pub use requests::HostRequest;
pub use stdio::{reply_json, serve};
