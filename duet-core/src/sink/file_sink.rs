use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::models::pcm::PcmBuffer;
use crate::processing::mixer::MixEngine;
use crate::storage::wav_writer::{FinalizedWav, WavWriter};

use super::BufferSink;

/// Buffers queued between the capture callback and the writer thread.
const QUEUE_CAPACITY: usize = 64;

/// Consecutive write failures after which the sink stops touching the
/// file for the rest of the session.
const MAX_CONSECUTIVE_FAILURES: u32 = 50;

enum Command {
    Buffer(PcmBuffer),
    Finish,
}

/// Incremental file destination for one capture source.
///
/// The capture callback only enqueues; a dedicated writer thread
/// normalizes each buffer to the sink's output format and appends it in
/// arrival order. The WAV file is created lazily when the first buffer
/// arrives (or at finalize, so even an instantly-stopped recording
/// leaves a valid container behind).
pub struct FileSink {
    path: PathBuf,
    tx: Sender<Command>,
    dropped: Arc<AtomicU64>,
    worker: Mutex<Option<thread::JoinHandle<Result<FinalizedWav, CaptureError>>>>,
}

impl FileSink {
    pub fn new(path: PathBuf, sample_rate: f64, bit_depth: u16) -> Self {
        let (tx, rx) = bounded::<Command>(QUEUE_CAPACITY);
        let worker_path = path.clone();

        let handle = thread::Builder::new()
            .name("file-sink-writer".into())
            .spawn(move || {
                let engine = MixEngine::new(sample_rate);
                let mut writer: Option<WavWriter> = None;
                let mut consecutive_failures: u32 = 0;

                for command in rx {
                    let buffer = match command {
                        Command::Buffer(b) => b,
                        Command::Finish => break,
                    };
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        continue;
                    }

                    if writer.is_none() {
                        match WavWriter::create(worker_path.clone(), sample_rate as u32, 2, bit_depth)
                        {
                            Ok(w) => writer = Some(w),
                            Err(e) => {
                                log::error!("file sink could not open {:?}: {}", worker_path, e);
                                consecutive_failures = MAX_CONSECUTIVE_FAILURES;
                                continue;
                            }
                        }
                    }

                    let stereo = engine.to_canonical_stereo(buffer.samples(), buffer.format());
                    let bytes = MixEngine::pcm_bytes(&stereo, bit_depth);
                    match writer.as_mut().unwrap().write_pcm(&bytes) {
                        Ok(()) => consecutive_failures = 0,
                        Err(e) => {
                            consecutive_failures += 1;
                            log::warn!("buffer write failed ({}): {}", consecutive_failures, e);
                            if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                                log::error!(
                                    "giving up on {:?} after {} consecutive write failures",
                                    worker_path,
                                    consecutive_failures
                                );
                            }
                        }
                    }
                }

                let writer = match writer {
                    Some(w) => w,
                    None => WavWriter::create(worker_path, sample_rate as u32, 2, bit_depth)?,
                };
                writer.finalize()
            })
            .expect("failed to spawn file sink writer thread");

        Self {
            path,
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(Some(handle)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffers that never reached the writer because its queue was full.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drain the queue, close the file, and patch its header.
    pub fn finalize(&self) -> Result<FinalizedWav, CaptureError> {
        let handle = self
            .worker
            .lock()
            .take()
            .ok_or_else(|| CaptureError::StorageError("file sink already finalized".into()))?;

        let _ = self.tx.send(Command::Finish);
        handle
            .join()
            .map_err(|_| CaptureError::StorageError("file sink writer thread panicked".into()))?
    }
}

impl BufferSink for FileSink {
    fn write(&self, buffer: &PcmBuffer) {
        match self.tx.try_send(Command::Buffer(buffer.clone())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 100 == 0 {
                    log::warn!("file sink queue saturated, {} buffers dropped", dropped);
                }
            }
        }
    }
}
