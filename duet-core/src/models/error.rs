use thiserror::Error;

/// Errors surfaced by capture sources, sinks, the mixing engine, and the
/// recording controller.
///
/// Setup-time failures are always returned synchronously to the caller.
/// Steady-state buffer-write failures are logged and counted instead of
/// being raised through this type; a dropped buffer must not abort an
/// otherwise healthy recording.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("a recording is already in progress")]
    RecordingInProgress,

    #[error("no capturable display or output context found")]
    NoDisplayFound,

    #[error("no audio device found")]
    NoAudioDeviceFound,

    #[error("setup failed: {0}")]
    SetupFailed(String),

    #[error("capture engine error: {0}")]
    CaptureEngineError(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

impl CaptureError {
    /// User-facing hint for errors the user can fix themselves.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::PermissionDenied(_) => Some(
                "open the system privacy settings and allow this application \
                 to record the screen and use the microphone",
            ),
            Self::NoDisplayFound => {
                Some("connect a display before starting a system-audio recording")
            }
            Self::NoAudioDeviceFound => {
                Some("connect or enable an audio input device in the system sound settings")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_errors_carry_remediation() {
        let err = CaptureError::PermissionDenied("microphone".into());
        assert!(err.remediation().is_some());
        assert!(err.to_string().contains("microphone"));
    }

    #[test]
    fn setup_errors_have_no_remediation() {
        assert!(CaptureError::SetupFailed("disk full".into()).remediation().is_none());
        assert!(CaptureError::RecordingInProgress.remediation().is_none());
    }
}
