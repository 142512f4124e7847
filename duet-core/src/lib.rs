//! Platform-agnostic core of the Duet recorder: capture two
//! independently clocked audio streams (system playback and microphone),
//! meter and buffer them, and mix them into a single canonical WAV file.
//!
//! ```text
//!  CaptureProvider (system) ──┐
//!                             ├── BufferSink ── MixEngine ── WavWriter
//!  CaptureProvider (mic)   ───┘
//! ```
//!
//! The [`session::controller::RecordingController`] owns the lifecycle:
//! it checks permissions, starts the sources, routes their buffers into
//! sinks chosen by the [`models::config::RecordingMode`], and on stop
//! finalizes one output file plus a JSON metadata sidecar.
//!
//! Platform backends implement [`traits::capture_provider::CaptureProvider`];
//! the [`capture::synthetic::SyntheticCapture`] generator stands in where
//! no OS capture stack is wired up and drives the deterministic tests.

pub mod capture;
pub mod mix;
pub mod models;
pub mod processing;
pub mod session;
pub mod sink;
pub mod storage;
pub mod traits;

pub use capture::context::CaptureContext;
pub use capture::synthetic::{Delivery, SyntheticCapture, SyntheticConfig, TestSignal};
pub use mix::incremental::IncrementalMixer;
pub use mix::offline::OfflineMixer;
pub use models::artifact::{RecordingArtifact, RecordingMetadata};
pub use models::config::{MixStrategy, RecorderConfig, RecordingMode};
pub use models::error::CaptureError;
pub use models::pcm::{
    PcmBuffer, PcmFormat, CANONICAL_BIT_DEPTH, CANONICAL_CHANNELS, CANONICAL_SAMPLE_RATE,
};
pub use models::source::{AudioLevels, DeviceInfo, SessionDiagnostics, SourceKind};
pub use models::state::RecorderState;
pub use processing::mixer::{MixEngine, MIC_GAIN, SYSTEM_GAIN};
pub use session::controller::RecordingController;
pub use sink::file_sink::FileSink;
pub use sink::memory_sink::MemorySink;
pub use sink::BufferSink;
pub use storage::wav_writer::{FinalizedWav, WavWriter};
pub use traits::capture_provider::{AudioBufferCallback, CaptureProvider};
pub use traits::permission_gate::{AlwaysGranted, PermissionGate, PermissionStatus};
pub use traits::session_delegate::SessionDelegate;
