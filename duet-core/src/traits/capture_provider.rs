use std::sync::Arc;

use crate::models::error::CaptureError;
use crate::models::pcm::PcmFormat;
use crate::models::source::DeviceInfo;

/// Callback invoked when a capture source has a buffer ready.
///
/// Parameters: interleaved f32 samples, the actual sample rate, and the
/// channel count. Fires on a dedicated real-time thread; the slice is
/// only valid for the duration of the call, so implementations must copy
/// or enqueue and return quickly — never perform file I/O here.
pub type AudioBufferCallback = Arc<dyn Fn(&[f32], f64, u16) + Send + Sync + 'static>;

/// One audio producer: a system-audio tap or a microphone.
///
/// Each instance owns at most one underlying engine. Starting while
/// already running is an error; stopping an already-stopped source is a
/// no-op. `stop` must also be safe to call from the error path of a
/// partial `start`, releasing whatever was already created.
pub trait CaptureProvider: Send + Sync {
    /// Whether the backing device currently exists.
    fn is_available(&self) -> bool;

    /// The hardware's native format, read from the device rather than
    /// assumed. Used to decide resampling and channel reconciliation.
    fn native_format(&self) -> PcmFormat;

    /// Open the engine and begin delivering buffers via `callback`.
    fn start(&mut self, callback: AudioBufferCallback) -> Result<(), CaptureError>;

    /// Halt the stream and release the engine. Idempotent.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Information about the device backing this source.
    fn device_info(&self) -> DeviceInfo;
}
