//! Black-body rain: like digital rain, but every drop adds color temperature.
//!
//! A drop lands white-hot and cools linearly towards a dull red before it
//! disappears. Overlapping drops add their temperatures, capped at twice the
//! peak so a cluster of drops can't run away. Pixels are converted with the
//! black-body curve fit in [`crate::color::temperature_to_rgb`] and sent as
//! RGB.

use super::{Animation, decay, spawn_probability, spread_range};
use crate::StripConfig;
use crate::color::{Pixel, temperature_to_rgb};
use crate::output::FrameOutput;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct BlackBodyOptions {
    /// Temperature of a fresh drop, in kelvin
    pub peak_temperature: f64,
    /// Drops are removed once they cool to this, in kelvin
    pub floor_temperature: f64,
    /// Time to cool from peak to floor
    pub decay: Duration,
    /// Spread speed in pixels per second
    pub spread_rate: f64,
    /// Average time between new drops
    pub spawn_interval: Duration,
}

impl Default for BlackBodyOptions {
    fn default() -> Self {
        Self {
            peak_temperature: 20_000.0,
            floor_temperature: 1_000.0,
            decay: Duration::from_millis(1500),
            spread_rate: 6.0,
            spawn_interval: Duration::from_millis(1500),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeatDrop {
    pub pixel: usize,
    pub temperature: f64,
    pub width: f64,
}

pub struct BlackBodyRain {
    strip: StripConfig,
    opts: BlackBodyOptions,
    temperature_step: f64,
    spread_step: f64,
    spawn_chance: f64,
    drops: Vec<HeatDrop>,
    canvas: Vec<f64>,
    rng: StdRng,
}

impl BlackBodyRain {
    pub fn new(strip: StripConfig, opts: BlackBodyOptions) -> Self {
        let range = opts.peak_temperature - opts.floor_temperature;
        Self {
            strip,
            temperature_step: range * strip.fraction_per_tick(opts.decay),
            spread_step: opts.spread_rate * strip.tick_seconds(),
            spawn_chance: spawn_probability(strip, opts.spawn_interval),
            drops: Vec::new(),
            canvas: vec![0.0; strip.pixel_count],
            rng: StdRng::from_entropy(),
            opts,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Kelvin lost by every drop each tick.
    pub fn temperature_step(&self) -> f64 {
        self.temperature_step
    }

    pub fn drops(&self) -> &[HeatDrop] {
        &self.drops
    }

    pub fn spawn_drop_at(&mut self, pixel: usize) {
        self.drops.push(HeatDrop {
            pixel,
            temperature: self.opts.peak_temperature,
            width: 1.0,
        });
    }

    fn spawn_random_drop(&mut self) {
        if self.strip.pixel_count > 0 {
            let pixel = self.rng.gen_range(0..self.strip.pixel_count);
            self.spawn_drop_at(pixel);
        }
    }

    fn advance_drops(&mut self) {
        let len = self.canvas.len();
        let floor = self.opts.floor_temperature;

        for drop in &mut self.drops {
            for heat in &mut self.canvas[spread_range(drop.pixel, drop.width, len)] {
                *heat += drop.temperature;
            }

            drop.temperature = floor + decay(drop.temperature - floor, self.temperature_step);
            drop.width += self.spread_step;
        }

        self.drops.retain(|drop| drop.temperature > floor);
    }

    fn composite(&self, out: &mut dyn FrameOutput) {
        let cap = 2.0 * self.opts.peak_temperature;
        for &heat in &self.canvas {
            if heat <= 0.0 {
                out.write_pixel(Pixel::OFF);
            } else {
                out.write_pixel(temperature_to_rgb(heat.min(cap)).into());
            }
        }
    }
}

impl Animation for BlackBodyRain {
    fn init(&mut self) {
        self.drops.clear();
        self.canvas.fill(0.0);
        self.spawn_random_drop();
    }

    fn tick(&mut self, out: &mut dyn FrameOutput) {
        self.canvas.fill(0.0);

        if self.rng.gen_bool(self.spawn_chance) {
            self.spawn_random_drop();
        }

        self.advance_drops();
        self.composite(out);
    }
}
