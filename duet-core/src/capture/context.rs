use crate::models::pcm::PcmFormat;

/// Negotiated state of the OS-level capture plumbing for a session.
///
/// Tap and aggregate-device creation stay behind an explicit simulation
/// boundary; this type replaces loosely-typed tap descriptions with a
/// sum type that every use site matches exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureContext {
    /// No tap or aggregate has been negotiated.
    NotConfigured,
    /// A per-source tap exists and reported its format.
    TapConfigured { device_id: String, format: PcmFormat },
    /// A virtual aggregate device spans both sources on one clock.
    /// `drift_correction` is the measured rate compensation between the
    /// member clocks; 0.0 means no correction has been measured.
    AggregateReady {
        device_id: String,
        drift_correction: f64,
    },
}

impl CaptureContext {
    /// Tap context for a single source. Ids derive from the source
    /// label, so repeated negotiation is stable.
    pub fn tap_for(label: &str, format: PcmFormat) -> Self {
        Self::TapConfigured {
            device_id: format!("tap-{}", label),
            format,
        }
    }

    /// Aggregate context spanning a system device and a microphone.
    pub fn aggregate_for(system_id: &str, mic_id: &str) -> Self {
        Self::AggregateReady {
            device_id: format!("agg-{}+{}", system_id, mic_id),
            drift_correction: 0.0,
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::NotConfigured => None,
            Self::TapConfigured { device_id, .. } => Some(device_id),
            Self::AggregateReady { device_id, .. } => Some(device_id),
        }
    }

    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::NotConfigured)
    }
}
