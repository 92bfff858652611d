//! Render thread: owns the engine and the output channel, ticks at a fixed rate.
//!
//! Pattern code and pixel writes only ever run on this thread. The async HTTP
//! server talks to it by sending `RenderCommand` values through an `mpsc`
//! channel and reads back a shared `EngineStatus`.
//!
//! ## Rust concepts
//! - `std::sync::mpsc` with `recv_timeout` as the tick timer
//! - `tokio::sync::oneshot` to answer an async caller from a plain thread
//! - `std::ops::ControlFlow` for "keep going" / "stop" decisions
//! - Generic functions (`render_loop<O: FrameOutput>`) so tests can swap the output

use crate::engine::{Engine, TickOutcome};
use crate::output::FrameOutput;
use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

// ── Commands ─────────────────────────────────────────────────────────

/// Commands sent from the HTTP server to the render thread.
pub enum RenderCommand {
    /// Switch patterns. The id that actually became active is sent back on
    /// `reply`; it differs from `id` when `id` is unknown.
    Load {
        id: String,
        reply: oneshot::Sender<String>,
    },
    /// Stop ticking and hand the output back to the caller.
    Shutdown,
}

// ── Status ───────────────────────────────────────────────────────────

/// Shared status: the render thread writes it, HTTP handlers read it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    /// Id of the running pattern, `null` before the first load
    #[schema(example = "rain")]
    pub active_pattern: Option<String>,
    /// Frames drawn since startup
    pub frames_rendered: u64,
    /// Ticks skipped because the device was still busy
    pub frames_skipped: u64,
    /// Ticks where the pattern panicked
    pub tick_failures: u64,
    /// Server version
    pub version: String,
}

impl EngineStatus {
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Idle => {}
            TickOutcome::Rendered => self.frames_rendered += 1,
            TickOutcome::Skipped => self.frames_skipped += 1,
            TickOutcome::Failed => self.tick_failures += 1,
        }
    }
}

// ── Render loop ──────────────────────────────────────────────────────

/// How far behind schedule the loop may fall before it stops catching up.
const MAX_LAG_TICKS: u32 = 2;

/// Main render loop. Runs on a dedicated thread until it receives
/// `Shutdown` or every sender is dropped, then returns `output` so the
/// caller can close it.
///
/// Between ticks the loop blocks in `recv_timeout` until the next deadline,
/// so commands are handled as soon as they arrive and take effect on the
/// following tick. If a tick overruns by more than two periods the schedule
/// is reset instead of firing a burst of late frames.
pub fn render_loop<O: FrameOutput>(
    rx: Receiver<RenderCommand>,
    status: Arc<Mutex<EngineStatus>>,
    mut engine: Engine,
    mut output: O,
    tick_interval: Duration,
) -> O {
    status.lock().unwrap().active_pattern = engine.active_pattern().map(str::to_string);
    tracing::info!("Render thread started, ticking every {}ms", tick_interval.as_millis());

    let mut deadline = Instant::now() + tick_interval;

    loop {
        let waited = wait_for_tick(&rx, deadline, |cmd| handle_command(cmd, &mut engine, &status));
        if waited.is_break() {
            return output;
        }

        let outcome = engine.tick(&mut output);
        status.lock().unwrap().record(outcome);

        deadline = next_deadline(deadline, Instant::now(), tick_interval);
    }
}

/// Handle commands until `deadline`. Returns `Break` when the loop should
/// stop. Once the deadline has passed no further command is taken, so a
/// steady stream of commands can't hold off the next tick.
fn wait_for_tick(
    rx: &Receiver<RenderCommand>,
    deadline: Instant,
    mut handle: impl FnMut(RenderCommand) -> ControlFlow<()>,
) -> ControlFlow<()> {
    loop {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(timeout) {
            Ok(cmd) => {
                if handle(cmd).is_break() {
                    tracing::info!("Render thread: shutdown requested.");
                    return ControlFlow::Break(());
                }
                if Instant::now() >= deadline {
                    return ControlFlow::Continue(());
                }
            }
            Err(RecvTimeoutError::Timeout) => return ControlFlow::Continue(()),
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("Render thread: channel closed, shutting down.");
                return ControlFlow::Break(());
            }
        }
    }
}

/// Deadline of the tick after the one that was due at `deadline`. More than
/// `MAX_LAG_TICKS` behind at `now`, the schedule restarts from `now`.
fn next_deadline(deadline: Instant, now: Instant, tick_interval: Duration) -> Instant {
    let next = deadline + tick_interval;
    let lag = now.saturating_duration_since(next);
    if lag > tick_interval * MAX_LAG_TICKS {
        tracing::warn!("Render loop fell {}ms behind, resetting schedule", lag.as_millis());
        now
    } else {
        next
    }
}

fn handle_command(
    cmd: RenderCommand,
    engine: &mut Engine,
    status: &Mutex<EngineStatus>,
) -> ControlFlow<()> {
    match cmd {
        RenderCommand::Load { id, reply } => {
            let active = engine.load(&id).to_string();
            status.lock().unwrap().active_pattern = Some(active.clone());
            if reply.send(active).is_err() {
                tracing::debug!("Load requester went away before the reply");
            }
            ControlFlow::Continue(())
        }
        RenderCommand::Shutdown => ControlFlow::Break(()),
    }
}

// ── Tests ──────────────────────────────────────────────────────────
