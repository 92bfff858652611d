//! Digital rain: colored drops land on the strip, flash white, spread
//! outwards and fade.
//!
//! Each tick paints every live drop into an accumulation canvas, then turns
//! each canvas cell into one HSV pixel:
//! - hue: plain mean of the contributing hues. Drops near 0.0 and 1.0 average
//!   towards 0.5 rather than wrapping around red.
//! - saturation: `1 - sum(whiteness)`, floored at 0
//! - value: `sum(value)`, capped at 1

use super::{Animation, decay, spawn_probability, spread_range};
use crate::StripConfig;
use crate::color::Hsv;
use crate::output::FrameOutput;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Knobs for a rain pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct RainOptions {
    /// Hue drops are randomized around, 0-1
    pub base_hue: f64,
    /// Drops get `base_hue` plus or minus up to this much
    pub hue_variance: f64,
    /// Paint uncovered pixels with `base_hue` instead of leaving them off
    pub background: bool,
    /// Brightness of the background, when enabled
    pub background_value: f64,
    /// How long a fresh drop's white flash takes to fade
    pub white_decay: Duration,
    /// How long a drop takes to fade out completely
    pub decay: Duration,
    /// Spread speed in pixels per second
    pub spread_rate: f64,
    /// Average time between new drops
    pub spawn_interval: Duration,
}

impl Default for RainOptions {
    fn default() -> Self {
        Self {
            base_hue: 0.65,
            hue_variance: 0.3,
            background: false,
            background_value: 0.3,
            white_decay: Duration::from_millis(300),
            decay: Duration::from_secs(1),
            spread_rate: 6.0,
            spawn_interval: Duration::from_millis(1500),
        }
    }
}

/// One raindrop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RainDrop {
    pub pixel: usize,
    pub hue: f64,
    /// 1 - saturation; starts white
    pub whiteness: f64,
    /// Brightness; the drop is gone once this reaches 0
    pub value: f64,
    pub width: f64,
}

impl RainDrop {
    fn new(pixel: usize, hue: f64) -> Self {
        Self {
            pixel,
            hue,
            whiteness: 1.0,
            value: 1.0,
            width: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Cell {
    hue_sum: f64,
    hue_count: u32,
    white: f64,
    value: f64,
}

pub struct Rain {
    strip: StripConfig,
    opts: RainOptions,
    white_step: f64,
    value_step: f64,
    spread_step: f64,
    spawn_chance: f64,
    drops: Vec<RainDrop>,
    canvas: Vec<Cell>,
    rng: StdRng,
}

impl Rain {
    pub fn new(strip: StripConfig, opts: RainOptions) -> Self {
        Self {
            strip,
            white_step: strip.fraction_per_tick(opts.white_decay),
            value_step: strip.fraction_per_tick(opts.decay),
            spread_step: opts.spread_rate * strip.tick_seconds(),
            spawn_chance: spawn_probability(strip, opts.spawn_interval),
            drops: Vec::new(),
            canvas: vec![Cell::default(); strip.pixel_count],
            rng: StdRng::from_entropy(),
            opts,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn options(&self) -> &RainOptions {
        &self.opts
    }

    /// Live drops, oldest first.
    pub fn drops(&self) -> &[RainDrop] {
        &self.drops
    }

    /// Drop a raindrop at a chosen pixel and hue.
    pub fn spawn_drop_at(&mut self, pixel: usize, hue: f64) {
        self.drops.push(RainDrop::new(pixel, hue));
    }

    fn spawn_random_drop(&mut self) {
        if self.strip.pixel_count == 0 {
            return;
        }
        let pixel = self.rng.gen_range(0..self.strip.pixel_count);
        let variance = self.opts.hue_variance;
        let offset = if variance > 0.0 {
            self.rng.gen_range(-variance..variance)
        } else {
            0.0
        };
        self.spawn_drop_at(pixel, self.opts.base_hue + offset);
    }

    fn clear_canvas(&mut self) {
        let blank = if self.opts.background {
            Cell {
                hue_sum: self.opts.base_hue,
                hue_count: 1,
                white: 0.0,
                value: self.opts.background_value,
            }
        } else {
            Cell::default()
        };
        self.canvas.fill(blank);
    }

    /// Paint every drop into the canvas, then age it.
    fn advance_drops(&mut self) {
        let len = self.canvas.len();
        for drop in &mut self.drops {
            for cell in &mut self.canvas[spread_range(drop.pixel, drop.width, len)] {
                cell.hue_sum += drop.hue;
                cell.hue_count += 1;
                cell.white += drop.whiteness;
                cell.value += drop.value;
            }

            drop.whiteness = decay(drop.whiteness, self.white_step);
            drop.value = decay(drop.value, self.value_step);
            drop.width += self.spread_step;
        }

        self.drops.retain(|drop| drop.value > 0.0);
    }

    fn composite(&self, out: &mut dyn FrameOutput) {
        for cell in &self.canvas {
            let hue = if cell.hue_count > 0 {
                cell.hue_sum / f64::from(cell.hue_count)
            } else {
                0.0
            };
            let saturation = (1.0 - cell.white).max(0.0);
            let value = cell.value.min(1.0);
            out.write_pixel(Hsv::new(hue, saturation, value).into());
        }
    }
}

impl Animation for Rain {
    fn init(&mut self) {
        self.drops.clear();
        self.clear_canvas();
        tracing::debug!("Can you feel the rain?");
        self.spawn_random_drop();
    }

    fn tick(&mut self, out: &mut dyn FrameOutput) {
        self.clear_canvas();

        if self.rng.gen_bool(self.spawn_chance) {
            self.spawn_random_drop();
            tracing::trace!("Plop! ({} drops)", self.drops.len());
        }

        self.advance_drops();
        self.composite(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Pixel;
    use crate::testing::RecordingOutput;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const NEVER: Duration = Duration::MAX;

    fn strip(tick_ms: u64) -> StripConfig {
        StripConfig::new(32, Duration::from_millis(tick_ms))
    }

    fn quiet_rain(strip: StripConfig, opts: RainOptions) -> Rain {
        Rain::new(
            strip,
            RainOptions {
                spawn_interval: NEVER,
                ..opts
            },
        )
        .with_seed(11)
    }

    fn hsv(pixel: Pixel) -> Hsv {
        match pixel {
            Pixel::Hsv(hsv) => hsv,
            Pixel::Rgb(_) => panic!("rain writes HSV"),
        }
    }

    #[test]
    fn init_starts_with_one_drop() {
        let mut rain = quiet_rain(strip(33), RainOptions::default());
        rain.init();
        assert_eq!(rain.drops().len(), 1);

        let drop = rain.drops()[0];
        assert!(drop.pixel < 32);
        assert!((0.35..0.95).contains(&drop.hue));

        rain.spawn_drop_at(3, 0.1);
        rain.init();
        assert_eq!(rain.drops().len(), 1);
    }

    #[test]
    fn fresh_drop_is_a_white_flash() {
        let mut rain = quiet_rain(strip(33), RainOptions::default());
        let mut out = RecordingOutput::new();
        rain.spawn_drop_at(10, 0.5);
        rain.tick(&mut out);

        let pixels = out.take();
        assert_eq!(pixels.len(), 32);
        assert_eq!(hsv(pixels[10]), Hsv::new(0.5, 0.0, 1.0));
        assert_eq!(hsv(pixels[9]), Hsv::new(0.5, 0.0, 1.0));
        assert_eq!(hsv(pixels[11]).value, 0.0);
    }

    #[rstest]
    #[case(33, 1000, 31)]
    #[case(50, 500, 10)]
    #[case(33, 300, 10)]
    fn drop_fades_out_in_ceil_of_decay_over_tick(
        #[case] tick_ms: u64,
        #[case] decay_ms: u64,
        #[case] expected_ticks: usize,
    ) {
        let opts = RainOptions {
            decay: Duration::from_millis(decay_ms),
            ..RainOptions::default()
        };
        let mut rain = quiet_rain(strip(tick_ms), opts);
        let mut out = RecordingOutput::new();
        rain.spawn_drop_at(4, 0.2);

        let mut ticks = 0;
        while !rain.drops().is_empty() {
            rain.tick(&mut out);
            ticks += 1;
            for drop in rain.drops() {
                assert!(drop.value >= 0.0 && drop.whiteness >= 0.0);
            }
            assert!(ticks <= expected_ticks);
        }
        assert_eq!(ticks, expected_ticks);
    }

    #[test]
    fn single_drop_leaves_pixel_dark_after_one_second() {
        let mut rain = quiet_rain(strip(33), RainOptions::default());
        let mut out = RecordingOutput::new();
        rain.spawn_drop_at(10, 0.5);

        for _ in 0..31 {
            rain.tick(&mut out);
        }
        assert!(rain.drops().is_empty());

        out.take();
        rain.tick(&mut out);
        assert_eq!(hsv(out.take()[10]).value, 0.0);
    }

    #[test]
    fn drops_spread_while_fading() {
        let mut rain = quiet_rain(strip(100), RainOptions::default());
        let mut out = RecordingOutput::new();
        rain.spawn_drop_at(16, 0.5);

        rain.tick(&mut out);
        assert_eq!(out.take().len(), 32);
        rain.tick(&mut out);
        // Width 1.6 after one tick at 6 px/s: covers 15..=17.
        let lit: Vec<usize> = out
            .take()
            .iter()
            .enumerate()
            .filter(|(_, p)| hsv(**p).value > 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(lit, vec![15, 16, 17]);
        assert!((rain.drops()[0].width - 2.2).abs() < 1e-9);
    }

    #[test]
    fn hue_average_does_not_wrap() {
        let mut rain = quiet_rain(strip(33), RainOptions::default());
        let mut out = RecordingOutput::new();
        rain.spawn_drop_at(5, 0.05);
        rain.spawn_drop_at(5, 0.95);
        rain.tick(&mut out);

        let pixel = hsv(out.take()[5]);
        assert!((pixel.hue - 0.5).abs() < 1e-9);
        assert_eq!(pixel.value, 1.0);
    }

    #[test]
    fn background_fills_uncovered_pixels() {
        let opts = RainOptions {
            base_hue: 0.13,
            background: true,
            ..RainOptions::default()
        };
        let mut rain = quiet_rain(strip(33), opts);
        let mut out = RecordingOutput::new();
        rain.tick(&mut out);

        for pixel in out.take() {
            assert_eq!(hsv(pixel), Hsv::new(0.13, 1.0, 0.3));
        }
    }

    #[test]
    fn spawns_follow_the_configured_rate() {
        let opts = RainOptions {
            spawn_interval: Duration::from_millis(33),
            decay: Duration::from_millis(33),
            ..RainOptions::default()
        };
        let mut rain = Rain::new(strip(33), opts).with_seed(5);
        let mut out = RecordingOutput::new();

        // Probability 1 each tick; each drop lives exactly one tick.
        for _ in 0..10 {
            rain.tick(&mut out);
            assert!(rain.drops().is_empty());
            let lit = out.take().iter().filter(|p| hsv(**p).value > 0.0).count();
            assert!(lit >= 1);
        }
    }
}
