use super::config::RecordingMode;

/// Recording lifecycle state machine.
///
/// ```text
/// idle → starting → recording → stopping → idle
///           ↓ (start failure, after rollback)
///         idle
/// ```
///
/// Exactly one recording may be active per controller. The terminal path
/// always returns to `Idle`; the final output path survives the
/// transition and is cleared only when the caller consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Starting,
    Recording { mode: RecordingMode },
    Stopping,
}

impl RecorderState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }

    /// Whether a session currently owns the controller (anything but idle).
    pub fn is_active(&self) -> bool {
        !self.is_idle()
    }

    pub fn mode(&self) -> Option<RecordingMode> {
        match self {
            Self::Recording { mode } => Some(*mode),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates() {
        assert!(RecorderState::Idle.is_idle());
        assert!(!RecorderState::Idle.is_active());
        assert!(RecorderState::Starting.is_active());
        assert!(RecorderState::Recording {
            mode: RecordingMode::SystemOnly
        }
        .is_recording());
        assert_eq!(RecorderState::Stopping.mode(), None);
    }
}
