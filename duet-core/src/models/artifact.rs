use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::RecordingMode;
use super::source::SourceKind;

/// The finished output of a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingArtifact {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub frames_written: u64,
    pub checksum: String,
    pub metadata: RecordingMetadata,
}

/// Serializable description of a recording, written as a JSON sidecar
/// next to the audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub mode: RecordingMode,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub tracks: Vec<SourceKind>,
}

impl RecordingMetadata {
    pub fn new(
        mode: RecordingMode,
        duration_secs: f64,
        file_path: &str,
        checksum: &str,
        sample_rate: u32,
        channels: u16,
        bit_depth: u16,
    ) -> Self {
        let mut tracks = Vec::new();
        if mode.needs_system() {
            tracks.push(SourceKind::System);
        }
        if mode.needs_microphone() {
            tracks.push(SourceKind::Microphone);
        }

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            mode,
            duration_secs,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            sample_rate,
            channels,
            bit_depth,
            tracks,
        }
    }
}
