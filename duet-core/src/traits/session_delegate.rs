use crate::models::artifact::RecordingArtifact;
use crate::models::error::CaptureError;
use crate::models::source::AudioLevels;
use crate::models::state::RecorderState;

/// Event sink for recording session notifications.
///
/// Methods are called from capture and processing threads, not the UI
/// thread. Implementations should marshal to the UI thread if needed.
pub trait SessionDelegate: Send + Sync {
    /// The session moved to a new lifecycle state.
    fn on_state_changed(&self, state: &RecorderState);

    /// Fresh RMS/peak levels from the capture callbacks.
    fn on_levels_updated(&self, levels: &AudioLevels);

    /// A non-fatal error occurred mid-recording.
    fn on_error(&self, error: &CaptureError);

    /// The recording finished and its file was finalized.
    fn on_recording_finished(&self, artifact: &RecordingArtifact);
}
