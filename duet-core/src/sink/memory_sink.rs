use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::models::pcm::PcmBuffer;
use crate::processing::mixer::MixEngine;
use crate::processing::ring_buffer::RingBuffer;

use super::BufferSink;

/// Bounded in-memory destination used when two streams must be mixed
/// before any bytes reach disk.
///
/// Buffers are normalized to interleaved stereo at the sink's rate and
/// accumulated in arrival order. Capacity is fixed; when the mixer falls
/// behind, the oldest frames are discarded so long recordings cannot
/// grow memory without bound.
pub struct MemorySink {
    ring: Mutex<RingBuffer>,
    engine: MixEngine,
    received_frames: AtomicU64,
}

impl MemorySink {
    pub fn new(output_rate: f64, capacity_frames: usize) -> Self {
        Self {
            ring: Mutex::new(RingBuffer::new(capacity_frames.max(1) * 2)),
            engine: MixEngine::new(output_rate),
            received_frames: AtomicU64::new(0),
        }
    }

    /// Remove and return up to `frames` frames of interleaved stereo.
    pub fn drain(&self, frames: usize) -> Vec<f32> {
        self.ring.lock().read(frames * 2)
    }

    /// Frames currently buffered.
    pub fn available_frames(&self) -> usize {
        self.ring.lock().len() / 2
    }

    /// Total frames ever received, including any later discarded.
    pub fn received_frames(&self) -> u64 {
        self.received_frames.load(Ordering::Relaxed)
    }

    /// Release all retained audio.
    pub fn clear(&self) {
        self.ring.lock().clear();
    }
}

impl BufferSink for MemorySink {
    fn write(&self, buffer: &PcmBuffer) {
        let stereo = self.engine.to_canonical_stereo(buffer.samples(), buffer.format());
        self.received_frames
            .fetch_add((stereo.len() / 2) as u64, Ordering::Relaxed);
        self.ring.lock().write(&stereo);
    }
}
