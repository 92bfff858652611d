//! Procedural animations for an addressable RGB LED strip.
//!
//! The crate is split the way data flows to the strip:
//! - `gamma` and `color`: pure conversions from pattern colors to device bytes
//! - `device` and `output`: the byte stream and the frame-level output channel
//! - `pattern`: the animations themselves
//! - `engine` and `render`: the active-pattern registry and the fixed-rate
//!   render thread
//! - `server`: the HTTP API used to list and switch patterns

pub mod color;
pub mod device;
pub mod engine;
pub mod gamma;
pub mod output;
pub mod pattern;
pub mod render;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

// ── Strip configuration ────────────────────────────────────────────

/// Default number of pixels on the strip.
pub const DEFAULT_PIXEL_COUNT: usize = 32;

/// Default scheduler period (~30 frames per second).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(33);

/// Strip length and frame cadence, shared by every pattern.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable; patterns each keep their own
/// copy instead of reaching for global constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StripConfig {
    pub pixel_count: usize,
    pub tick_interval: Duration,
}

impl StripConfig {
    pub fn new(pixel_count: usize, tick_interval: Duration) -> Self {
        Self {
            pixel_count,
            tick_interval,
        }
    }

    /// Scheduler period in seconds.
    pub fn tick_seconds(&self) -> f64 {
        self.tick_interval.as_secs_f64()
    }

    /// How much of something that takes `duration` happens in one tick.
    pub fn fraction_per_tick(&self, duration: Duration) -> f64 {
        self.tick_seconds() / duration.as_secs_f64()
    }

    /// Bytes in one frame on the wire: the reset byte plus 3 per pixel.
    pub fn frame_byte_count(&self) -> usize {
        1 + self.pixel_count * 3
    }
}

impl Default for StripConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PIXEL_COUNT, DEFAULT_TICK_INTERVAL)
    }
}

// ── Tests ──────────────────────────────────────────────────────────
