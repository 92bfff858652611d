//! Blinking yellow bananas marching along the strip.

use super::Animation;
use crate::StripConfig;
use crate::color::{Hsv, Pixel};
use crate::output::FrameOutput;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BANANA_WIDTH: usize = 3;
const GAP_WIDTH: usize = 4;
/// Ticks between blinks; each blink also shifts the bananas one pixel.
const BLINK_TICKS: u32 = 4;
/// Middle of the banana palette: 0.13 is very ripe orange, 0.19 almost green.
const RIPE_HUE: f64 = 0.16;
const HUE_SPREAD: f64 = 0.03;

pub struct Bananas {
    strip: StripConfig,
    offset: usize,
    lit: bool,
    blink_ticks: u32,
    /// Hue of the banana currently being drawn, carried across ticks.
    hue: f64,
    rng: StdRng,
}

impl Bananas {
    pub fn new(strip: StripConfig) -> Self {
        Self {
            strip,
            offset: 0,
            lit: true,
            blink_ticks: 0,
            hue: RIPE_HUE,
            rng: StdRng::from_entropy(),
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl Animation for Bananas {
    fn init(&mut self) {
        self.offset = 0;
        self.lit = true;
        self.blink_ticks = 0;
    }

    fn tick(&mut self, out: &mut dyn FrameOutput) {
        let period = BANANA_WIDTH + GAP_WIDTH;

        for i in 0..self.strip.pixel_count {
            if !self.lit {
                out.write_pixel(Pixel::OFF);
                continue;
            }

            let phase = (self.offset + i) % period;
            if phase == 0 {
                self.hue = RIPE_HUE + self.rng.gen_range(-HUE_SPREAD..HUE_SPREAD);
            }

            if phase <= BANANA_WIDTH {
                out.write_pixel(Hsv::new(self.hue, 1.0, 1.0).into());
            } else {
                out.write_pixel(Pixel::OFF);
            }
        }

        self.blink_ticks += 1;
        if self.blink_ticks >= BLINK_TICKS {
            self.blink_ticks = 0;
            self.offset = (self.offset + 1) % period;
            self.lit = !self.lit;
        }
    }
}
