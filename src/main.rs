//! LED strip pattern server
//!
//! Drives an addressable RGB strip through a serial device and runs a small
//! HTTP API for listing and switching animations.
//!
//! ## Architecture
//! - **Device writer thread** (std::thread): drains queued bytes to the device
//! - **Render thread** (std::thread): owns the engine and output channel, ticks
//!   the active pattern at a fixed rate
//! - **HTTP server** (tokio/axum): accepts API requests, sends commands via channel
//!
//! ## Rust concepts
//! - `#[tokio::main]` async entry point
//! - `std::thread::Builder` for a named render thread
//! - `std::sync::mpsc` channel between async and sync worlds
//! - Graceful shutdown with `tokio::signal::ctrl_c`
//!
//! ## Usage
//! ```sh
//! ./target/release/strip-patterns --device /dev/spidev0.0 --pixels 32 --port 3001
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;
use strip_patterns::device::DEFAULT_HIGH_WATER_MARK;
use strip_patterns::engine::Engine;
use strip_patterns::output::OutputChannel;
use strip_patterns::pattern::DEFAULT_PATTERN;
use strip_patterns::render::{EngineStatus, RenderCommand, render_loop};
use strip_patterns::server::{self, AppState};
use strip_patterns::{DEFAULT_PIXEL_COUNT, DEFAULT_TICK_INTERVAL, StripConfig};
use tracing_subscriber::EnvFilter;

/// LED strip pattern server
#[derive(Parser)]
#[command(name = "strip-patterns")]
#[command(about = "Procedural animations for an RGB LED strip, with an HTTP API")]
#[command(version)]
struct Args {
    /// Serial device the strip is attached to
    #[arg(long, default_value = "/dev/spidev0.0")]
    device: PathBuf,

    /// Number of pixels on the strip
    #[arg(long, default_value_t = DEFAULT_PIXEL_COUNT)]
    pixels: usize,

    /// Milliseconds between frames
    #[arg(long, default_value_t = DEFAULT_TICK_INTERVAL.as_millis() as u64)]
    tick_ms: u64,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "3001")]
    port: u16,

    /// Pattern to start with
    #[arg(long, default_value = DEFAULT_PATTERN)]
    pattern: String,

    /// Queued bytes at which the device stream reports backpressure
    #[arg(long, default_value_t = DEFAULT_HIGH_WATER_MARK)]
    high_water_mark: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();
    let strip = StripConfig::new(args.pixels, Duration::from_millis(args.tick_ms.max(1)));

    tracing::info!("Strip pattern server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Strip: {} pixels ({} bytes per frame) @ {}ms per frame",
        strip.pixel_count,
        strip.frame_byte_count(),
        strip.tick_interval.as_millis()
    );
    tracing::info!("Device: {}", args.device.display());

    // Without a device there is nothing to do.
    let output = match OutputChannel::open(&args.device, args.high_water_mark) {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut engine = match Engine::with_default_patterns(strip) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Invalid pattern registry: {}", e);
            std::process::exit(1);
        }
    };
    let patterns = Arc::new(engine.list_patterns());
    engine.load(&args.pattern);

    // Create the channel for sending commands to the render thread.
    let (tx, rx) = mpsc::channel();

    // Render thread writes the status, HTTP handlers read it.
    let status = Arc::new(Mutex::new(EngineStatus::new()));

    let render_status = status.clone();
    let tick_interval = strip.tick_interval;
    let render_handle = match thread::Builder::new()
        .name("render".to_string())
        .spawn(move || render_loop(rx, render_status, engine, output, tick_interval))
    {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Failed to start render thread: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = AppState {
        command_tx: tx.clone(),
        status,
        patterns,
    };

    let app = server::create_router(app_state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Try: curl http://localhost:{}/api/patterns", args.port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    tracing::info!("Shutting down...");
    if tx.send(RenderCommand::Shutdown).is_err() {
        tracing::warn!("Render thread already stopped");
    }

    match render_handle.join() {
        Ok(mut output) => {
            let stats = output.stats();
            tracing::info!(
                "Frames sent: {}, refused: {}, cut short: {}",
                stats.started,
                stats.refused,
                stats.truncated
            );
            match output.close() {
                Ok(()) => tracing::info!("Lightstrip closed"),
                Err(e) => tracing::error!("{}", e),
            }
        }
        Err(_) => tracing::error!("Render thread panicked"),
    }
}

/// Resolves on Ctrl+C. If the handler can't be installed the server keeps
/// running until killed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
