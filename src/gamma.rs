//! Gamma correction lookup table for the strip's data bytes.
//!
//! The strip takes 7 bits of intensity per channel. The most significant bit
//! of every data byte must be set; a byte with the high bit clear is a latch
//! (frame reset) marker. Values follow the Adafruit table:
//! `0x80 | round(127 * (i / 255)^2.5)`.

use std::sync::LazyLock;

/// Exponent applied to the linear 0-255 intensity.
pub const GAMMA: f64 = 2.5;

/// High bit that marks a byte as pixel data rather than a reset.
pub const DATA_BIT: u8 = 0x80;

static TABLE: LazyLock<[u8; 256]> = LazyLock::new(|| {
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let level = (i as f64 / 255.0).powf(GAMMA) * 127.0;
        *entry = DATA_BIT | level.round() as u8;
    }
    table
});

/// Encode a linear intensity into the device data byte.
pub fn encode(intensity: u8) -> u8 {
    TABLE[intensity as usize]
}

/// The whole table, mostly useful for inspection and tests.
pub fn table() -> &'static [u8; 256] {
    &TABLE
}
