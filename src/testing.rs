//! Test doubles shared by the unit tests.

use crate::color::Pixel;
use crate::device::{FlushCallback, Sink, StreamListener};
use crate::output::FrameOutput;
use std::io;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    bytes: Vec<u8>,
    pending: Vec<FlushCallback>,
    listener: Option<Arc<dyn StreamListener>>,
    full: bool,
    closed: bool,
}

/// In-memory sink whose flushing and backpressure the test drives by hand.
#[derive(Clone, Default)]
pub(crate) struct MockSink {
    state: Arc<Mutex<MockState>>,
}

impl MockSink {
    pub(crate) fn bytes(&self) -> Vec<u8> {
        self.state.lock().unwrap().bytes.clone()
    }

    /// While full, every write reports backpressure and fires "full".
    pub(crate) fn set_full(&self, full: bool) {
        self.state.lock().unwrap().full = full;
    }

    /// Pretend everything queued reached the device.
    pub(crate) fn flush(&self) {
        let pending = std::mem::take(&mut self.state.lock().unwrap().pending);
        for callback in pending {
            callback();
        }
    }

    pub(crate) fn drain(&self) {
        let listener = self.state.lock().unwrap().listener.clone();
        if let Some(listener) = listener {
            listener.on_drain();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

impl Sink for MockSink {
    fn write(&mut self, bytes: &[u8], on_flushed: Option<FlushCallback>) -> bool {
        let mut state = self.state.lock().unwrap();
        state.bytes.extend_from_slice(bytes);
        if let Some(callback) = on_flushed {
            state.pending.push(callback);
        }
        if !state.full {
            return true;
        }

        let listener = state.listener.clone();
        drop(state);
        if let Some(listener) = listener {
            listener.on_full();
        }
        false
    }

    fn subscribe(&mut self, listener: Arc<dyn StreamListener>) {
        self.state.lock().unwrap().listener = Some(listener);
    }

    fn close(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Frame output that records pixels instead of encoding them.
pub(crate) struct RecordingOutput {
    /// What `start_frame` answers.
    pub(crate) accept: bool,
    pub(crate) frames_started: usize,
    pub(crate) pixels: Vec<Pixel>,
}

impl RecordingOutput {
    pub(crate) fn new() -> Self {
        Self {
            accept: true,
            frames_started: 0,
            pixels: Vec::new(),
        }
    }

    /// Pixels written since the last call.
    pub(crate) fn take(&mut self) -> Vec<Pixel> {
        std::mem::take(&mut self.pixels)
    }
}

impl FrameOutput for RecordingOutput {
    fn start_frame(&mut self) -> bool {
        if self.accept {
            self.frames_started += 1;
            self.pixels.clear();
        }
        self.accept
    }

    fn write_pixel(&mut self, pixel: Pixel) {
        self.pixels.push(pixel);
    }
}
