//! Non-blocking byte stream to the strip's serial device.
//!
//! Writes to `/dev/spidev*` block until the kernel has clocked the bytes out,
//! which can take longer than a frame period. `DeviceWriter` queues writes
//! and hands them to a dedicated writer thread, so callers only ever touch an
//! in-memory queue. Like a buffered write stream it reports backpressure: a
//! write returns `false` once the queue holds `high_water_mark` bytes or more,
//! and listeners hear "full" and later "drained".
//!
//! ## Rust concepts
//! - `Mutex` + `Condvar` for a producer/consumer queue
//! - Trait objects (`Arc<dyn StreamListener>`) for event subscribers
//! - `Box<dyn FnOnce() + Send>` for one-shot completion callbacks

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Default queue size at which writes start reporting backpressure.
pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

/// Runs once the bytes it was queued with have been written to the device.
pub type FlushCallback = Box<dyn FnOnce() + Send + 'static>;

/// Backpressure notifications from a [`Sink`].
///
/// Both hooks run while the sink holds its queue lock, so a "full" is always
/// observed before the "drained" that ends it. Keep them to flag flips.
pub trait StreamListener: Send + Sync {
    /// The queue reached the high-water mark.
    fn on_full(&self);
    /// A queue that was full has been written out completely.
    fn on_drain(&self);
}

/// A byte stream with write-side backpressure.
pub trait Sink: Send {
    /// Queue `bytes`. Returns `false` when the queue is at or above its
    /// high-water mark after this write. The bytes are queued either way.
    fn write(&mut self, bytes: &[u8], on_flushed: Option<FlushCallback>) -> bool;

    /// Register for "full" and "drained" notifications.
    fn subscribe(&mut self, listener: Arc<dyn StreamListener>);

    /// Write out everything queued and release the device.
    fn close(&mut self) -> io::Result<()>;
}

// ── Queue shared with the writer thread ────────────────────────────

struct Chunk {
    bytes: Vec<u8>,
    on_flushed: Option<FlushCallback>,
}

#[derive(Default)]
struct Queue {
    chunks: VecDeque<Chunk>,
    buffered: usize,
    needs_drain: bool,
    closing: bool,
    listeners: Vec<Arc<dyn StreamListener>>,
    error: Option<io::Error>,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── DeviceWriter ───────────────────────────────────────────────────

/// Queue in front of a blocking writer, drained by its own thread.
pub struct DeviceWriter {
    shared: Arc<Shared>,
    high_water_mark: usize,
    worker: Option<JoinHandle<()>>,
}

impl DeviceWriter {
    /// Open `path` for writing (created and truncated if it is a plain file)
    /// and start the writer thread.
    pub fn open(path: impl AsRef<Path>, high_water_mark: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::spawn(file, high_water_mark)
    }

    /// Start a writer thread over any blocking writer.
    pub fn spawn<W: Write + Send + 'static>(writer: W, high_water_mark: usize) -> io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("device-writer".to_string())
            .spawn(move || write_loop(writer, &worker_shared))?;

        Ok(Self {
            shared,
            high_water_mark,
            worker: Some(worker),
        })
    }

    /// Bytes queued but not yet written to the device.
    pub fn buffered(&self) -> usize {
        self.shared.lock().buffered
    }
}

impl Sink for DeviceWriter {
    fn write(&mut self, bytes: &[u8], on_flushed: Option<FlushCallback>) -> bool {
        let mut queue = self.shared.lock();
        if queue.closing {
            tracing::warn!("Write of {} bytes after close ignored", bytes.len());
            return false;
        }

        queue.buffered += bytes.len();
        queue.chunks.push_back(Chunk {
            bytes: bytes.to_vec(),
            on_flushed,
        });

        let below_mark = queue.buffered < self.high_water_mark;
        if !below_mark && !queue.needs_drain {
            queue.needs_drain = true;
            for listener in &queue.listeners {
                listener.on_full();
            }
        }
        drop(queue);

        self.shared.wake.notify_one();
        below_mark
    }

    fn subscribe(&mut self, listener: Arc<dyn StreamListener>) {
        self.shared.lock().listeners.push(listener);
    }

    fn close(&mut self) -> io::Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        self.shared.lock().closing = true;
        self.shared.wake.notify_all();

        worker
            .join()
            .map_err(|_| io::Error::other("device writer thread panicked"))?;

        match self.shared.lock().error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for DeviceWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Device stream closed with error: {}", e);
        }
    }
}

/// Writer thread body: take everything queued, write it, then report.
fn write_loop<W: Write>(mut writer: W, shared: &Shared) {
    loop {
        let batch: Vec<Chunk> = {
            let mut queue = shared.lock();
            while queue.chunks.is_empty() && !queue.closing {
                queue = shared
                    .wake
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            queue.chunks.drain(..).collect()
        };

        if batch.is_empty() {
            break;
        }

        let len: usize = batch.iter().map(|c| c.bytes.len()).sum();
        let mut bytes = Vec::with_capacity(len);
        for chunk in &batch {
            bytes.extend_from_slice(&chunk.bytes);
        }
        let result = writer.write_all(&bytes).and_then(|()| writer.flush());

        {
            let mut queue = shared.lock();
            queue.buffered -= len;

            if let Err(e) = result {
                if queue.error.is_none() {
                    tracing::error!("Device write failed: {}", e);
                    queue.error = Some(e);
                } else {
                    tracing::debug!("Device write failed again: {}", e);
                }
            }

            if queue.needs_drain && queue.buffered == 0 {
                queue.needs_drain = false;
                for listener in &queue.listeners {
                    listener.on_drain();
                }
            }
        }

        // Callbacks run even when the write failed so nobody waits forever.
        for chunk in batch {
            if let Some(on_flushed) = chunk.on_flushed {
                on_flushed();
            }
        }
    }

    tracing::debug!("Device writer thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingListener {
        full: AtomicUsize,
        drained: AtomicUsize,
    }

    impl StreamListener for CountingListener {
        fn on_full(&self) {
            self.full.fetch_add(1, Ordering::SeqCst);
        }

        fn on_drain(&self) {
            self.drained.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Writer that blocks each write until the test hands it a permit.
    struct GatedWriter {
        permits: mpsc::Receiver<()>,
        out: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for GatedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.permits
                .recv()
                .map_err(|_| io::Error::other("gate closed"))?;
            self.out.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn counter_callback(counter: &Arc<AtomicUsize>) -> Option<FlushCallback> {
        let counter = Arc::clone(counter);
        Some(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn writes_reach_the_file_in_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("spidev");
        let flushed = Arc::new(AtomicUsize::new(0));

        let mut writer = DeviceWriter::open(&path, DEFAULT_HIGH_WATER_MARK).unwrap();
        assert!(writer.write(&[0x00], counter_callback(&flushed)));
        assert!(writer.write(&[0x81, 0x82, 0x83], None));
        assert!(writer.write(&[0x00], counter_callback(&flushed)));
        writer.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![0x00, 0x81, 0x82, 0x83, 0x00]);
        assert_eq!(flushed.load(Ordering::SeqCst), 2);
        assert_eq!(writer.buffered(), 0);
    }

    #[test]
    fn open_fails_when_device_is_absent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("no-such-dir").join("spidev0.0");
        let err = DeviceWriter::open(&path, DEFAULT_HIGH_WATER_MARK).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn reports_full_then_drained() {
        let (permit_tx, permit_rx) = mpsc::channel();
        let out = Arc::new(Mutex::new(Vec::new()));
        let listener = Arc::new(CountingListener::default());

        let gated = GatedWriter {
            permits: permit_rx,
            out: Arc::clone(&out),
        };
        let mut writer = DeviceWriter::spawn(gated, 4).unwrap();
        writer.subscribe(listener.clone());

        assert!(writer.write(&[1, 2, 3], None));
        assert_eq!(listener.full.load(Ordering::SeqCst), 0);

        assert!(!writer.write(&[4, 5], None));
        assert_eq!(listener.full.load(Ordering::SeqCst), 1);
        assert_eq!(listener.drained.load(Ordering::SeqCst), 0);

        // Still full: no second "full" notification.
        assert!(!writer.write(&[6], None));
        assert_eq!(listener.full.load(Ordering::SeqCst), 1);

        for _ in 0..3 {
            permit_tx.send(()).unwrap();
        }
        writer.close().unwrap();

        assert_eq!(*out.lock().unwrap(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(listener.drained.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn write_after_close_is_refused() {
        let mut writer = DeviceWriter::spawn(io::sink(), 16).unwrap();
        writer.close().unwrap();
        assert!(!writer.write(&[0x00], None));
    }

    #[test]
    fn failed_writes_still_run_callbacks_and_surface_on_close() {
        let flushed = Arc::new(AtomicUsize::new(0));
        let mut writer = DeviceWriter::spawn(BrokenWriter, 16).unwrap();
        writer.write(&[0x00], counter_callback(&flushed));

        let err = writer.close().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(flushed.load(Ordering::SeqCst), 1);
    }
}
