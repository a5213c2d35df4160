//! The clock is a plain function returning a millisecond counter that only
//! ever moves forward, wrapping at `u32::MAX`. Engines use it for CONNACK and
//! keep-alive timeouts; compare readings with [`elapsed_ms`] so wrap-around is
//! handled.

use std::sync::OnceLock;
use std::time::Instant;

/// A monotonically increasing millisecond counter.
pub type GetCurrentTimeMs = fn() -> u32;

/// Milliseconds since the first call in this process.
pub fn monotonic_ms() -> u32 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    // Truncation is the intended wrap-around.
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u32
}

/// Milliseconds between two readings of the same clock.
pub fn elapsed_ms(start: u32, now: u32) -> u32 {
    now.wrapping_sub(start)
}
