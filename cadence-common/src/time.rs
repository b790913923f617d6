//! Timestamp utilities

use chrono::Utc;

/// Wall-clock milliseconds since the Unix epoch
///
/// Snapshots pair every sampled position with this value so observers can
/// extrapolate the live position from `(position, time, speed)`.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert engine microseconds to host-facing milliseconds (truncating)
pub fn micros_to_millis(micros: u64) -> u64 {
    micros / 1000
}
