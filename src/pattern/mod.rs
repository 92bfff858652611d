//! Patterns: small animations rendered one frame per scheduler tick.
//!
//! Every pattern variant is a plain struct implementing [`Animation`]. The
//! set of variants is closed, so [`PatternKind`] holds them in an enum and
//! dispatches with `match`, no boxing needed. [`Pattern`] adds the registry
//! metadata (id, display name, sort order).

mod bananas;
mod black_body;
mod rain;
mod rainbow;

pub use bananas::Bananas;
pub use black_body::{BlackBodyOptions, BlackBodyRain, HeatDrop};
pub use rain::{Rain, RainDrop, RainOptions};
pub use rainbow::Rainbow;

use crate::StripConfig;
use crate::output::FrameOutput;
use serde::Serialize;
use std::ops::Range;
use std::time::Duration;

/// Pattern loaded at startup and when an unknown id is requested.
pub const DEFAULT_PATTERN: &str = "rainbow";

pub trait Animation {
    /// Reset all per-activation state.
    fn init(&mut self);

    /// Advance one tick and write exactly one frame of pixels.
    fn tick(&mut self, out: &mut dyn FrameOutput);
}

/// Every animation the engine knows how to run.
pub enum PatternKind {
    Rainbow(Rainbow),
    Bananas(Bananas),
    Rain(Rain),
    BlackBodyRain(BlackBodyRain),
}

impl PatternKind {
    pub fn init(&mut self) {
        match self {
            Self::Rainbow(p) => p.init(),
            Self::Bananas(p) => p.init(),
            Self::Rain(p) => p.init(),
            Self::BlackBodyRain(p) => p.init(),
        }
    }

    pub fn tick(&mut self, out: &mut dyn FrameOutput) {
        match self {
            Self::Rainbow(p) => p.tick(out),
            Self::Bananas(p) => p.tick(out),
            Self::Rain(p) => p.tick(out),
            Self::BlackBodyRain(p) => p.tick(out),
        }
    }
}

/// A registered pattern.
pub struct Pattern {
    id: String,
    friendly_name: String,
    sort_index: i32,
    kind: PatternKind,
}

impl Pattern {
    pub fn new(
        id: impl Into<String>,
        friendly_name: impl Into<String>,
        sort_index: i32,
        kind: PatternKind,
    ) -> Self {
        Self {
            id: id.into(),
            friendly_name: friendly_name.into(),
            sort_index,
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn sort_index(&self) -> i32 {
        self.sort_index
    }

    pub fn kind(&self) -> &PatternKind {
        &self.kind
    }

    pub fn init(&mut self) {
        self.kind.init();
    }

    pub fn tick(&mut self, out: &mut dyn FrameOutput) {
        self.kind.tick(out);
    }

    pub fn info(&self) -> PatternInfo {
        PatternInfo {
            id: self.id.clone(),
            friendly_name: self.friendly_name.clone(),
        }
    }
}

/// What the API shows for a pattern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatternInfo {
    /// Identifier passed to `load`
    #[schema(example = "rain")]
    pub id: String,
    /// User-facing name
    #[schema(example = "Digital Rain")]
    pub friendly_name: String,
}

/// The standard registry.
pub fn default_patterns(strip: StripConfig) -> Vec<Pattern> {
    vec![
        Pattern::new(
            "rainbow",
            "Taste the Rainbow",
            0,
            PatternKind::Rainbow(Rainbow::new(strip)),
        ),
        Pattern::new(
            "bananas",
            "Bojangles's Bananas",
            1,
            PatternKind::Bananas(Bananas::new(strip)),
        ),
        Pattern::new(
            "rain",
            "Digital Rain",
            2,
            PatternKind::Rain(Rain::new(strip, RainOptions::default())),
        ),
        Pattern::new(
            "orange",
            "Orange Haze",
            3,
            PatternKind::Rain(Rain::new(
                strip,
                RainOptions {
                    base_hue: 0.13,
                    hue_variance: 0.13,
                    background: true,
                    ..RainOptions::default()
                },
            )),
        ),
        Pattern::new(
            "blackbody",
            "Black Body Rain",
            10,
            PatternKind::BlackBodyRain(BlackBodyRain::new(strip, BlackBodyOptions::default())),
        ),
    ]
}

// ── Helpers shared by the drop-based patterns ──────────────────────

/// Levels this close to zero count as fully decayed.
const DECAY_EPSILON: f64 = 1e-9;

/// Linear decay that lands exactly on zero and never goes below it.
pub(crate) fn decay(level: f64, step: f64) -> f64 {
    let next = level - step;
    if next <= DECAY_EPSILON { 0.0 } else { next }
}

/// Pixels covered by a drop at `origin` with spread `width`:
/// `ceil(origin - width) .. origin + width`, clipped to the strip.
pub(crate) fn spread_range(origin: usize, width: f64, len: usize) -> Range<usize> {
    let center = origin as f64;
    let start = (center - width).ceil().max(0.0) as usize;
    let end = ((center + width).ceil().max(0.0) as usize).min(len);
    start.min(end)..end
}

/// Per-tick Bernoulli probability for an event that happens on average
/// once every `mean_interval`.
pub(crate) fn spawn_probability(strip: StripConfig, mean_interval: Duration) -> f64 {
    let p = strip.fraction_per_tick(mean_interval);
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}
