use std::fs;
use std::path::{Path, PathBuf};

use crate::models::artifact::RecordingMetadata;
use crate::models::error::CaptureError;

/// Sidecar location for a recording: `{stem}.metadata.json` next to the
/// audio file.
fn sidecar_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Persist recording metadata as a JSON sidecar.
pub fn write_metadata(
    metadata: &RecordingMetadata,
    recording_path: &Path,
) -> Result<(), CaptureError> {
    let sidecar = sidecar_path(recording_path);
    let json = serde_json::to_vec_pretty(metadata).map_err(|e| {
        CaptureError::StorageError(format!(
            "metadata for {:?} did not serialize: {}",
            recording_path, e
        ))
    })?;
    fs::write(&sidecar, json)
        .map_err(|e| CaptureError::StorageError(format!("cannot write sidecar {:?}: {}", sidecar, e)))
}

/// Load the metadata sidecar belonging to a recording.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, CaptureError> {
    let sidecar = sidecar_path(recording_path);
    let json = fs::read_to_string(&sidecar)
        .map_err(|e| CaptureError::StorageError(format!("cannot read sidecar {:?}: {}", sidecar, e)))?;
    serde_json::from_str(&json).map_err(|e| {
        CaptureError::StorageError(format!("sidecar {:?} is not valid metadata: {}", sidecar, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::RecordingMode;

    #[test]
    fn sidecar_round_trip() {
        let recording: PathBuf =
            std::env::temp_dir().join(format!("duet_meta_{}.wav", std::process::id()));
        let meta = RecordingMetadata::new(
            RecordingMode::MicrophoneOnly,
            1.5,
            recording.to_string_lossy().as_ref(),
            "cafe",
            44_100,
            2,
            16,
        );

        write_metadata(&meta, &recording).unwrap();
        let back = read_metadata(&recording).unwrap();
        assert_eq!(back, meta);

        fs::remove_file(recording.with_extension("metadata.json")).ok();
    }

    #[test]
    fn missing_sidecar_is_a_storage_error() {
        let recording: PathBuf =
            std::env::temp_dir().join(format!("duet_meta_missing_{}.wav", std::process::id()));
        let err = read_metadata(&recording).unwrap_err();
        assert!(matches!(err, CaptureError::StorageError(_)));
        assert!(err.to_string().contains("metadata.json"));
    }
}
