use crate::models::pcm::PcmFormat;

use super::wav_format;

/// Fixed per-source gains applied when combining the two streams.
pub const SYSTEM_GAIN: f32 = 0.75;
pub const MIC_GAIN: f32 = 0.50;

/// Pure-math mixing engine: gain/clamp combination of the two streams,
/// format reconciliation to the canonical output layout, linear
/// resampling, and PCM quantization. No platform dependencies; both the
/// offline and the incremental mix strategies run every sample through
/// `mix_sample`, which is what makes them bit-for-bit equivalent.
#[derive(Debug, Clone)]
pub struct MixEngine {
    pub output_rate: f64,
}

impl MixEngine {
    pub fn new(output_rate: f64) -> Self {
        Self { output_rate }
    }

    /// `clamp(-1, 1, 0.75 * system + 0.50 * mic)`.
    #[inline]
    pub fn mix_sample(system: f32, mic: f32) -> f32 {
        (SYSTEM_GAIN * system + MIC_GAIN * mic).clamp(-1.0, 1.0)
    }

    /// Mix two interleaved stereo windows in frame lockstep.
    ///
    /// The shorter window contributes silence for its trailing frames;
    /// output length is `max(frames) * 2`.
    pub fn mix_stereo_windows(&self, system: &[f32], mic: &[f32]) -> Vec<f32> {
        let frames = (system.len() / 2).max(mic.len() / 2);
        if frames == 0 {
            return Vec::new();
        }

        let mut out = vec![0.0f32; frames * 2];
        for (i, sample) in out.iter_mut().enumerate() {
            let sys = system.get(i).copied().unwrap_or(0.0);
            let mic = mic.get(i).copied().unwrap_or(0.0);
            *sample = Self::mix_sample(sys, mic);
        }
        out
    }

    /// Normalize an arbitrary interleaved capture buffer to interleaved
    /// stereo at `output_rate`.
    ///
    /// Mono sources feed both output channels; sources wider than stereo
    /// are averaged down to mono first (best-effort channel policy).
    pub fn to_canonical_stereo(&self, samples: &[f32], format: PcmFormat) -> Vec<f32> {
        match format.channels {
            0 => Vec::new(),
            1 => {
                let mono = self.resample(samples, format.sample_rate);
                self.interleave(&mono, &mono)
            }
            2 => self.resample_stereo(samples, format.sample_rate),
            n => {
                let mono = wav_format::downmix_to_mono(samples, n as usize);
                let mono = self.resample(&mono, format.sample_rate);
                self.interleave(&mono, &mono)
            }
        }
    }

    /// Interleave two mono channels into `[L0, R0, L1, R1, ...]`,
    /// zero-padding the shorter one.
    pub fn interleave(&self, left: &[f32], right: &[f32]) -> Vec<f32> {
        let frames = left.len().max(right.len());
        let mut out = vec![0.0f32; frames * 2];
        for i in 0..frames {
            out[i * 2] = left.get(i).copied().unwrap_or(0.0);
            out[i * 2 + 1] = right.get(i).copied().unwrap_or(0.0);
        }
        out
    }

    /// Linear-interpolation resampling for mono audio. Pass-through when
    /// the rates already match.
    pub fn resample(&self, samples: &[f32], source_rate: f64) -> Vec<f32> {
        if (source_rate - self.output_rate).abs() < 0.01 || samples.is_empty() {
            return samples.to_vec();
        }

        let ratio = self.output_rate / source_rate;
        let output_count = (samples.len() as f64 * ratio) as usize;
        let mut out = vec![0.0f32; output_count];
        for (i, sample) in out.iter_mut().enumerate() {
            let position = i as f64 / ratio;
            let index = position as usize;
            let fraction = (position - index as f64) as f32;

            if index + 1 < samples.len() {
                *sample = samples[index] * (1.0 - fraction) + samples[index + 1] * fraction;
            } else if index < samples.len() {
                *sample = samples[index];
            }
        }
        out
    }

    /// Linear-interpolation resampling for interleaved stereo audio.
    pub fn resample_stereo(&self, samples: &[f32], source_rate: f64) -> Vec<f32> {
        if (source_rate - self.output_rate).abs() < 0.01 || samples.is_empty() {
            return samples.to_vec();
        }

        let frames = samples.len() / 2;
        let ratio = self.output_rate / source_rate;
        let output_frames = (frames as f64 * ratio) as usize;
        let mut out = vec![0.0f32; output_frames * 2];
        for i in 0..output_frames {
            let position = i as f64 / ratio;
            let index = position as usize;
            let fraction = (position - index as f64) as f32;

            for ch in 0..2usize {
                if index + 1 < frames {
                    out[i * 2 + ch] = samples[index * 2 + ch] * (1.0 - fraction)
                        + samples[(index + 1) * 2 + ch] * fraction;
                } else if index < frames {
                    out[i * 2 + ch] = samples[index * 2 + ch];
                }
            }
        }
        out
    }

    /// Quantize f32 samples in `[-1, 1]` to little-endian 16-bit PCM.
    pub fn pcm16_bytes(samples: &[f32]) -> Vec<u8> {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            data.extend_from_slice(&value.to_le_bytes());
        }
        data
    }

    /// Quantize f32 samples in `[-1, 1]` to little-endian 24-bit PCM.
    pub fn pcm24_bytes(samples: &[f32]) -> Vec<u8> {
        const MAX_24: f32 = 8_388_607.0;
        let mut data = Vec::with_capacity(samples.len() * 3);
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * MAX_24) as i32;
            data.extend_from_slice(&value.to_le_bytes()[..3]);
        }
        data
    }

    /// Quantize at the given bit depth (16 or 24).
    pub fn pcm_bytes(samples: &[f32], bit_depth: u16) -> Vec<u8> {
        match bit_depth {
            24 => Self::pcm24_bytes(samples),
            _ => Self::pcm16_bytes(samples),
        }
    }

    /// RMS level of samples (0.0–1.0 for normalized audio).
    pub fn rms_level(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    /// Peak absolute level of samples.
    pub fn peak_level(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mix_sample_applies_fixed_gains() {
        assert_relative_eq!(MixEngine::mix_sample(0.4, 0.2), 0.4, epsilon = 1e-6);
        assert_relative_eq!(MixEngine::mix_sample(0.4, 0.0), 0.3, epsilon = 1e-6);
        assert_relative_eq!(MixEngine::mix_sample(0.0, 0.6), 0.3, epsilon = 1e-6);
    }

    #[test]
    fn mix_sample_clamps_without_wraparound() {
        assert_eq!(MixEngine::mix_sample(1.0, 1.0), 1.0);
        assert_eq!(MixEngine::mix_sample(-1.0, -1.0), -1.0);
    }

    #[test]
    fn mix_is_deterministic() {
        let engine = MixEngine::new(44_100.0);
        let system = vec![0.3f32; 64];
        let mic = vec![-0.1f32; 64];

        let a = engine.mix_stereo_windows(&system, &mic);
        let b = engine.mix_stereo_windows(&system, &mic);
        assert_eq!(a, b);
    }

    #[test]
    fn shorter_window_is_padded_with_silence() {
        let engine = MixEngine::new(44_100.0);
        let system = vec![0.4f32; 8]; // 4 frames
        let mic = vec![0.2f32; 4]; // 2 frames

        let out = engine.mix_stereo_windows(&system, &mic);
        assert_eq!(out.len(), 8);
        // First two frames: 0.75*0.4 + 0.50*0.2 = 0.4
        assert_relative_eq!(out[0], 0.4, epsilon = 1e-6);
        assert_relative_eq!(out[3], 0.4, epsilon = 1e-6);
        // Trailing frames: mic exhausted, 0.75*0.4 = 0.3
        assert_relative_eq!(out[4], 0.3, epsilon = 1e-6);
        assert_relative_eq!(out[7], 0.3, epsilon = 1e-6);
    }

    #[test]
    fn silent_mic_leaves_system_at_three_quarters() {
        let engine = MixEngine::new(44_100.0);
        let sine: Vec<f32> = (0..256)
            .map(|i| (i as f32 * 0.1).sin())
            .flat_map(|s| [s, s])
            .collect();
        let silence = vec![0.0f32; sine.len()];

        let out = engine.mix_stereo_windows(&sine, &silence);
        for (mixed, input) in out.iter().zip(&sine) {
            assert_relative_eq!(*mixed, 0.75 * input, epsilon = 1e-6);
        }
    }

    #[test]
    fn mono_source_feeds_both_channels() {
        let engine = MixEngine::new(44_100.0);
        let out = engine.to_canonical_stereo(&[0.1, 0.2], PcmFormat::mono(44_100.0));
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn wide_source_is_averaged_down() {
        let engine = MixEngine::new(44_100.0);
        // One 4-channel frame: mean = 0.25
        let out = engine.to_canonical_stereo(&[0.1, 0.2, 0.3, 0.4], PcmFormat::new(44_100.0, 4));
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[0], 0.25, epsilon = 1e-6);
        assert_relative_eq!(out[1], 0.25, epsilon = 1e-6);
    }

    #[test]
    fn resample_passthrough_when_rates_match() {
        let engine = MixEngine::new(48_000.0);
        let samples = vec![1.0, 2.0, 3.0];
        assert_eq!(engine.resample(&samples, 48_000.0), samples);
    }

    #[test]
    fn resample_doubles_sample_count() {
        let engine = MixEngine::new(48_000.0);
        let out = engine.resample(&[0.0, 1.0], 24_000.0);
        assert_eq!(out.len(), 4);
        assert_relative_eq!(out[1], 0.5, epsilon = 0.1); // midpoint interpolated
    }

    #[test]
    fn resample_stereo_halves_frames() {
        let engine = MixEngine::new(24_000.0);
        let samples: Vec<f32> = (0..200).map(|i| i as f32 / 200.0).collect();
        let out = engine.resample_stereo(&samples, 48_000.0);
        assert_eq!(out.len(), 100);
    }

    #[test]
    fn pcm16_clamps_and_scales() {
        let bytes = MixEngine::pcm16_bytes(&[0.0, 1.0, -1.0, 2.0]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 0);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[4], bytes[5]]), -i16::MAX);
        assert_eq!(i16::from_le_bytes([bytes[6], bytes[7]]), i16::MAX);
    }

    #[test]
    fn pcm24_full_scale() {
        let bytes = MixEngine::pcm24_bytes(&[1.0]);
        assert_eq!(bytes.len(), 3);
        let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
        assert_eq!(value, 8_388_607);
    }

    #[test]
    fn levels() {
        assert_eq!(MixEngine::rms_level(&[0.0, 0.0]), 0.0);
        assert_relative_eq!(MixEngine::rms_level(&[1.0, 1.0]), 1.0, epsilon = 1e-6);
        assert_relative_eq!(MixEngine::peak_level(&[0.1, -0.5, 0.3]), 0.5, epsilon = 1e-6);
    }
}
