//! Position sampling and stall detection
//!
//! The tracker holds the last `(position, wall clock)` sample that snapshots
//! report. Samples are taken on every state transition and discontinuity; a
//! fallback poller picks up buffered-position drift the engine never calls
//! back for, and the stall detector watches the render clock directly.

use cadence_common::time::now_millis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::EngineState;

/// Sampling cadence (`[position]` config section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    pub buffering_poll_ms: u64,
    pub playing_poll_ms: u64,
    pub paused_poll_ms: u64,
    pub stall_sample_ms: u64,
    /// Consecutive unchanged render samples that count as a stall
    pub stall_threshold: u32,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            buffering_poll_ms: 200,
            playing_poll_ms: 500,
            paused_poll_ms: 1000,
            stall_sample_ms: 50,
            stall_threshold: 3,
        }
    }
}

impl PositionConfig {
    /// Delay before the next buffered-position poll, `None` to stop polling
    pub fn poll_interval(&self, state: EngineState, play_when_ready: bool) -> Option<Duration> {
        let ms = match state {
            EngineState::Buffering => self.buffering_poll_ms,
            EngineState::Ready if play_when_ready => self.playing_poll_ms,
            EngineState::Ready => self.paused_poll_ms,
            EngineState::Idle | EngineState::Ended => return None,
        };
        Some(Duration::from_millis(ms))
    }

    pub fn stall_sample_interval(&self) -> Duration {
        Duration::from_millis(self.stall_sample_ms.max(1))
    }
}

/// Last sampled position as reported in snapshots
#[derive(Debug, Default)]
pub struct PositionTracker {
    update_position_us: u64,
    update_time_ms: i64,
    buffered_position_us: u64,
    /// Target of the seek in flight; reported instead of the engine position
    seek_target_us: Option<u64>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self { update_time_ms: now_millis(), ..Self::default() }
    }

    pub fn update_position_us(&self) -> u64 {
        self.update_position_us
    }

    pub fn update_time_ms(&self) -> i64 {
        self.update_time_ms
    }

    pub fn buffered_position_us(&self) -> u64 {
        self.buffered_position_us
    }

    pub fn set_buffered_position_us(&mut self, buffered_us: u64) {
        self.buffered_position_us = buffered_us;
    }

    pub fn seek_target_us(&self) -> Option<u64> {
        self.seek_target_us
    }

    pub fn set_seek_target_us(&mut self, target: Option<u64>) {
        self.seek_target_us = target;
    }

    /// Record `position_us` as sampled now
    pub fn sample(&mut self, position_us: u64) {
        self.update_position_us = position_us;
        self.update_time_ms = now_millis();
    }

    /// Sample unless the position is unchanged and playback is not advancing
    ///
    /// While advancing, the wall clock moves even if the engine reports the
    /// same position, so a fresh sample is always taken.
    pub fn sample_if_changed(&mut self, position_us: u64, advancing: bool) -> bool {
        if !advancing && position_us == self.update_position_us {
            return false;
        }
        self.sample(position_us);
        true
    }
}

/// Counts consecutive identical render-clock samples
#[derive(Debug)]
pub struct StallDetector {
    threshold: u32,
    last_render_us: Option<u64>,
    unchanged: u32,
}

impl StallDetector {
    pub fn new(threshold: u32) -> Self {
        Self { threshold: threshold.max(1), last_render_us: None, unchanged: 0 }
    }

    /// Feed one render-clock sample; true when a re-sample is due
    ///
    /// Fires once when the clock has been stuck for `threshold` samples and
    /// again when it starts moving after such a stall.
    pub fn observe(&mut self, render_us: u64) -> bool {
        let fire = if self.last_render_us == Some(render_us) {
            self.unchanged += 1;
            self.unchanged == self.threshold
        } else {
            let resumed = self.unchanged >= self.threshold;
            self.unchanged = 0;
            resumed
        };
        self.last_render_us = Some(render_us);
        fire
    }

    pub fn reset(&mut self) {
        self.last_render_us = None;
        self.unchanged = 0;
    }
}
