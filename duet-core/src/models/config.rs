use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// When the two source streams are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixStrategy {
    /// Each source records to its own temporary file; mixing happens in a
    /// final pass over the completed files.
    Offline,
    /// Buffers are mixed as they arrive and appended straight to the
    /// output file. Pairing is by arrival order, not hardware timestamp.
    Incremental,
}

/// What a recording captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMode {
    SystemOnly,
    MicrophoneOnly,
    Mixed { strategy: MixStrategy },
    /// Both sources on a shared (simulated) aggregate clock, written at
    /// 24-bit depth.
    SyncedMixed,
}

impl RecordingMode {
    pub fn needs_system(&self) -> bool {
        !matches!(self, Self::MicrophoneOnly)
    }

    pub fn needs_microphone(&self) -> bool {
        !matches!(self, Self::SystemOnly)
    }

    pub fn is_dual(&self) -> bool {
        self.needs_system() && self.needs_microphone()
    }
}

/// Configuration for the recording controller.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Canonical output sample rate in Hz (default: 44100).
    pub sample_rate: f64,

    /// Output bit depth (default: 16). Valid values: 16, 24.
    /// `SyncedMixed` recordings always write 24-bit.
    /// Output is always canonical stereo; see `CANONICAL_CHANNELS`.
    pub bit_depth: u16,

    /// Directory where recording files and offline-mix temporaries land.
    pub output_directory: PathBuf,

    /// Frame window size for the offline mix pass (default: 4096).
    pub mix_window_frames: usize,

    /// Cadence of the incremental mix loop in milliseconds (default: 100).
    pub live_chunk_millis: u64,

    /// Grace period after stopping sources, letting in-flight buffers
    /// land before the output is finalized (default: 100ms).
    pub stop_grace_millis: u64,

    /// Specific microphone device ID, or None for the system default.
    pub mic_device_id: Option<String>,
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate <= 0.0 {
            return Err("sample rate must be positive".into());
        }
        if ![16, 24].contains(&self.bit_depth) {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        if self.mix_window_frames == 0 {
            return Err("mix window must hold at least one frame".into());
        }
        Ok(())
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            bit_depth: 16,
            output_directory: PathBuf::from("."),
            mix_window_frames: 4096,
            live_chunk_millis: 100,
            stop_grace_millis: 100,
            mic_device_id: None,
        }
    }
}
