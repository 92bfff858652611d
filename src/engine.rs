//! Pattern engine: the registry and the one active pattern.
//!
//! The engine starts out with nothing active. [`Engine::load`] switches to a
//! pattern by id (falling back to the default for unknown ids) and resets it.
//! [`Engine::tick`] is called once per scheduler tick and produces at most one
//! frame.
//!
//! ## Rust concepts
//! - `thiserror` derive for a small error enum
//! - `std::panic::catch_unwind` to keep one bad frame from killing the loop
//! - Stable sorting with `sort_by_key`

use crate::StripConfig;
use crate::output::FrameOutput;
use crate::pattern::{DEFAULT_PATTERN, Pattern, PatternInfo, default_patterns};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("no patterns registered")]
    EmptyRegistry,
    #[error("pattern id {0:?} is registered more than once")]
    DuplicateId(String),
    #[error("default pattern {0:?} is not registered")]
    UnknownDefault(String),
}

/// What a single scheduler tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No pattern has been loaded yet.
    Idle,
    /// A frame was started and the pattern drew it.
    Rendered,
    /// The output refused the frame; the pattern was not ticked.
    Skipped,
    /// The pattern panicked while drawing.
    Failed,
}

pub struct Engine {
    patterns: Vec<Pattern>,
    default_index: usize,
    active: Option<usize>,
}

impl Engine {
    /// Build an engine over `patterns`. Ids must be unique and `default_id`
    /// must be one of them.
    pub fn new(patterns: Vec<Pattern>, default_id: &str) -> Result<Self, EngineError> {
        if patterns.is_empty() {
            return Err(EngineError::EmptyRegistry);
        }

        let mut seen = HashSet::new();
        for pattern in &patterns {
            if !seen.insert(pattern.id()) {
                return Err(EngineError::DuplicateId(pattern.id().to_string()));
            }
        }

        let default_index = patterns
            .iter()
            .position(|p| p.id() == default_id)
            .ok_or_else(|| EngineError::UnknownDefault(default_id.to_string()))?;

        Ok(Self {
            patterns,
            default_index,
            active: None,
        })
    }

    /// The standard pattern set, defaulting to rainbow.
    pub fn with_default_patterns(strip: StripConfig) -> Result<Self, EngineError> {
        Self::new(default_patterns(strip), DEFAULT_PATTERN)
    }

    /// Make `id` the active pattern and reset it. Unknown ids load the
    /// default instead. Returns the id that ended up active.
    pub fn load(&mut self, id: &str) -> &str {
        let index = match self.patterns.iter().position(|p| p.id() == id) {
            Some(index) => index,
            None => {
                tracing::warn!(
                    "Unknown pattern {:?}, loading {:?} instead",
                    id,
                    self.default_pattern()
                );
                self.default_index
            }
        };

        let pattern = &mut self.patterns[index];
        pattern.init();
        self.active = Some(index);
        tracing::info!("Loaded pattern {} ({})", pattern.id(), pattern.friendly_name());
        pattern.id()
    }

    pub fn active_pattern(&self) -> Option<&str> {
        self.active.map(|index| self.patterns[index].id())
    }

    pub fn default_pattern(&self) -> &str {
        self.patterns[self.default_index].id()
    }

    /// Every registered pattern, ordered by sort index. Ties keep
    /// registration order.
    pub fn list_patterns(&self) -> Vec<PatternInfo> {
        let mut sorted: Vec<&Pattern> = self.patterns.iter().collect();
        sorted.sort_by_key(|p| p.sort_index());
        sorted.into_iter().map(Pattern::info).collect()
    }

    /// Run one scheduler tick against `out`.
    pub fn tick(&mut self, out: &mut dyn FrameOutput) -> TickOutcome {
        let Some(index) = self.active else {
            return TickOutcome::Idle;
        };

        if !out.start_frame() {
            return TickOutcome::Skipped;
        }

        let pattern = &mut self.patterns[index];
        match panic::catch_unwind(AssertUnwindSafe(|| pattern.tick(out))) {
            Ok(()) => TickOutcome::Rendered,
            Err(cause) => {
                let message = cause
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| cause.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("Pattern {} failed to render a frame: {}", pattern.id(), message);
                TickOutcome::Failed
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
