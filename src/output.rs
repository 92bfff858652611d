//! Output channel: frames of gamma-encoded pixels with backpressure.
//!
//! The strip protocol is a reset byte (`0x00`) followed by three data bytes
//! per pixel in green, red, blue order. There is no length prefix or checksum,
//! so the channel never lets a frame go out half-written and then resume. When
//! the device falls behind, whole frames are shed instead:
//!
//! - `start_frame` refuses while the device stream is full, or while the
//!   previous frame's reset byte has not reached the device yet.
//! - `write_pixel` drops the remainder of the frame as soon as the stream
//!   reports full. A later "drained" only clears the full flag; the next
//!   frame has to be started explicitly.

use crate::color::Pixel;
use crate::device::{DeviceWriter, Sink, StreamListener};
use crate::gamma;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Latch marker that starts a frame.
pub const RESET_BYTE: u8 = 0x00;

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("could not open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not close device stream: {0}")]
    Close(#[source] io::Error),
}

/// Where patterns send their frames.
///
/// Implemented by [`OutputChannel`]; tests substitute recorders.
pub trait FrameOutput {
    /// Begin a new frame. `false` means the frame is dropped and pixel writes
    /// are ignored until the next successful call.
    fn start_frame(&mut self) -> bool;

    /// Send the next pixel of the current frame.
    fn write_pixel(&mut self, pixel: Pixel);
}

/// Device bytes for one pixel, in the strip's green-red-blue wiring order.
pub fn encode_pixel(pixel: Pixel) -> [u8; 3] {
    let [r, g, b] = pixel.to_rgb().to_bytes();
    [gamma::encode(g), gamma::encode(r), gamma::encode(b)]
}

/// Flags the device stream flips from its writer thread.
#[derive(Debug, Default)]
struct FlowState {
    drain_pending: AtomicBool,
    unflushed_resets: AtomicUsize,
}

impl StreamListener for FlowState {
    fn on_full(&self) {
        self.drain_pending.store(true, Ordering::Release);
        tracing::debug!("Device stream full");
    }

    fn on_drain(&self) {
        self.drain_pending.store(false, Ordering::Release);
        tracing::debug!("Device stream drained");
    }
}

/// Frame counters, for status reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames whose reset byte went out.
    pub started: u64,
    /// `start_frame` calls refused because of backpressure.
    pub refused: u64,
    /// Frames cut short because the stream filled up mid-frame.
    pub truncated: u64,
}

pub struct OutputChannel<S: Sink = DeviceWriter> {
    sink: S,
    flow: Arc<FlowState>,
    frame_dropped: bool,
    stats: FrameStats,
}

impl OutputChannel<DeviceWriter> {
    /// Open the strip's device and put it into a known state.
    pub fn open(path: impl AsRef<Path>, high_water_mark: usize) -> Result<Self, OutputError> {
        let path = path.as_ref();
        let sink = DeviceWriter::open(path, high_water_mark).map_err(|source| OutputError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Lightstrip ready on {}", path.display());
        Ok(Self::new(sink))
    }
}

impl<S: Sink> OutputChannel<S> {
    /// Wrap an already-open sink: subscribe to its backpressure
    /// notifications and write the initial reset byte.
    pub fn new(mut sink: S) -> Self {
        let flow = Arc::new(FlowState::default());
        sink.subscribe(flow.clone());
        // A full stream here is already recorded by the listener.
        sink.write(&[RESET_BYTE], None);

        Self {
            sink,
            flow,
            frame_dropped: false,
            stats: FrameStats::default(),
        }
    }

    /// Write out everything queued and release the device.
    pub fn close(&mut self) -> Result<(), OutputError> {
        self.sink.close().map_err(OutputError::Close)
    }

    pub fn is_frame_dropped(&self) -> bool {
        self.frame_dropped
    }

    pub fn is_drain_pending(&self) -> bool {
        self.flow.drain_pending.load(Ordering::Acquire)
    }

    /// Reset bytes written but not yet confirmed on the device.
    pub fn unflushed_resets(&self) -> usize {
        self.flow.unflushed_resets.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}

impl<S: Sink> FrameOutput for OutputChannel<S> {
    fn start_frame(&mut self) -> bool {
        let drain_pending = self.is_drain_pending();
        let unflushed = self.unflushed_resets();
        if drain_pending || unflushed > 0 {
            // Waiting for a full drain can take several frame periods; shed
            // load as soon as a reset is still in flight.
            self.frame_dropped = true;
            self.stats.refused += 1;
            tracing::trace!(drain_pending, unflushed, "Frame refused");
            return false;
        }

        self.frame_dropped = false;
        self.flow.unflushed_resets.fetch_add(1, Ordering::AcqRel);
        let flow = Arc::clone(&self.flow);
        let accepted = self.sink.write(
            &[RESET_BYTE],
            Some(Box::new(move || {
                flow.unflushed_resets.fetch_sub(1, Ordering::AcqRel);
            })),
        );

        if !accepted {
            self.frame_dropped = true;
            self.stats.refused += 1;
            tracing::debug!("Device stream full on reset byte, dropping frame");
            return false;
        }

        self.stats.started += 1;
        true
    }

    fn write_pixel(&mut self, pixel: Pixel) {
        if self.frame_dropped {
            return;
        }

        if !self.sink.write(&encode_pixel(pixel), None) {
            self.frame_dropped = true;
            self.stats.truncated += 1;
            tracing::debug!("Device stream full, dropping rest of frame");
        }
    }
}
