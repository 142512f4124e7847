use serde::{Deserialize, Serialize};

/// Which of the two capture roles a source fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    System,
    Microphone,
}

/// An audio device backing a capture source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub kind: SourceKind,
    pub is_default: bool,
}

/// Real-time level metering (RMS and peak, 0.0–1.0) for both sources.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioLevels {
    pub system_rms: f32,
    pub system_peak: f32,
    pub mic_rms: f32,
    pub mic_peak: f32,
}

/// Counters for debugging a capture session.
#[derive(Debug, Clone, Default)]
pub struct SessionDiagnostics {
    pub system_callback_count: u64,
    pub mic_callback_count: u64,
    pub system_samples_total: u64,
    pub mic_samples_total: u64,
    pub dropped_writes: u64,
    pub mix_cycles: u64,
    pub bytes_written: u64,
}
