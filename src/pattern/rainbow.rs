//! Full-saturation rainbow spread across the strip, scrolling over time.

use super::Animation;
use crate::StripConfig;
use crate::color::Hsv;
use crate::output::FrameOutput;
use std::time::Duration;

/// Time for the rainbow to scroll through one full hue cycle.
const DEFAULT_CYCLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Rainbow {
    strip: StripConfig,
    /// Hue advance per tick
    step: f64,
    /// Hue of pixel 0
    start_hue: f64,
}

impl Rainbow {
    pub fn new(strip: StripConfig) -> Self {
        Self {
            strip,
            step: strip.fraction_per_tick(DEFAULT_CYCLE),
            start_hue: 0.0,
        }
    }
}

impl Animation for Rainbow {
    fn init(&mut self) {
        self.start_hue = 0.0;
        tracing::debug!("Taste the rainbow");
    }

    fn tick(&mut self, out: &mut dyn FrameOutput) {
        let n = self.strip.pixel_count;
        for i in 0..n {
            let hue = self.start_hue + i as f64 / n as f64;
            out.write_pixel(Hsv::new(hue, 1.0, 1.0).into());
        }
        self.start_hue = (self.start_hue + self.step).rem_euclid(1.0);
    }
}
