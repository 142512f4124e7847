pub mod file_sink;
pub mod memory_sink;

use crate::models::pcm::PcmBuffer;

/// Per-source destination for captured buffers.
///
/// `write` is called from the capture callback and must not block on
/// I/O: implementations either retain a copy in memory or enqueue the
/// buffer for a dedicated writer thread. Write failures are absorbed
/// (logged and counted) rather than raised — one dropped buffer must
/// not end a recording.
pub trait BufferSink: Send + Sync {
    fn write(&self, buffer: &PcmBuffer);
}
