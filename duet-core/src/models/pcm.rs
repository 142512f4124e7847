use std::time::Duration;

/// Canonical output format: every mixed recording is normalized to this.
pub const CANONICAL_SAMPLE_RATE: f64 = 44_100.0;
pub const CANONICAL_CHANNELS: u16 = 2;
pub const CANONICAL_BIT_DEPTH: u16 = 16;

/// Sample rate and channel layout of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcmFormat {
    pub sample_rate: f64,
    pub channels: u16,
}

impl PcmFormat {
    pub fn new(sample_rate: f64, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn canonical() -> Self {
        Self::new(CANONICAL_SAMPLE_RATE, CANONICAL_CHANNELS)
    }

    pub fn mono(sample_rate: f64) -> Self {
        Self::new(sample_rate, 1)
    }
}

/// One block of interleaved float samples delivered by a capture source.
///
/// Always an owned copy: the slice handed to a real-time capture callback
/// belongs to the producing engine and is reused after the callback
/// returns, so it must never be retained. `host_time` is the offset from
/// the session's capture start at the moment the buffer arrived.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    samples: Vec<f32>,
    format: PcmFormat,
    host_time: Duration,
}

impl PcmBuffer {
    /// Copy samples out of a capture callback.
    pub fn copy_from(samples: &[f32], sample_rate: f64, channels: u16, host_time: Duration) -> Self {
        Self {
            samples: samples.to_vec(),
            format: PcmFormat::new(sample_rate, channels),
            host_time,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    pub fn sample_rate(&self) -> f64 {
        self.format.sample_rate
    }

    pub fn host_time(&self) -> Duration {
        self.host_time
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.format.channels == 0 {
            return 0;
        }
        self.samples.len() / self.format.channels as usize
    }
}
