use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::pcm::PcmFormat;
use crate::processing::mixer::MixEngine;
use crate::storage::wav_writer::{FinalizedWav, WavWriter};

/// Post-hoc mixing of two completed per-source WAV files.
///
/// Both files are walked in fixed-size frame windows advancing in
/// lockstep by frame position, never by wall-clock time. Each window is
/// decoded, normalized, mixed, and written before the next is read, so
/// memory stays proportional to the window size rather than the
/// recording length. The shorter file contributes silence for its
/// trailing windows; a single absent source degrades the same way. Only
/// when both sources are absent or empty is the mix refused.
pub struct OfflineMixer {
    engine: MixEngine,
    window_frames: usize,
    bit_depth: u16,
}

impl OfflineMixer {
    pub fn new(output_rate: f64, window_frames: usize, bit_depth: u16) -> Self {
        Self {
            engine: MixEngine::new(output_rate),
            window_frames: window_frames.max(1),
            bit_depth,
        }
    }

    /// Mix `system` and `mic` into one canonical-format file at `output`.
    pub fn mix(
        &self,
        system: Option<&Path>,
        mic: Option<&Path>,
        output: PathBuf,
    ) -> Result<FinalizedWav, CaptureError> {
        let mut system_source = WindowedSource::open(system, self.engine.output_rate)?;
        let mut mic_source = WindowedSource::open(mic, self.engine.output_rate)?;

        if system_source.is_none() && mic_source.is_none() {
            return Err(CaptureError::SetupFailed(
                "no input audio to mix: both sources are absent or empty".into(),
            ));
        }

        let mut writer = WavWriter::create(
            output,
            self.engine.output_rate as u32,
            2,
            self.bit_depth,
        )?;

        loop {
            let system_window = next_window(&mut system_source, self.window_frames, &self.engine)?;
            let mic_window = next_window(&mut mic_source, self.window_frames, &self.engine)?;
            if system_window.is_empty() && mic_window.is_empty() {
                break;
            }

            // The longer window decides the step; the exhausted source
            // contributes zero frames.
            let mixed = self.engine.mix_stereo_windows(&system_window, &mic_window);
            writer.write_pcm(&MixEngine::pcm_bytes(&mixed, self.bit_depth))?;
        }

        writer.finalize()
    }
}

fn next_window(
    source: &mut Option<WindowedSource>,
    frames: usize,
    engine: &MixEngine,
) -> Result<Vec<f32>, CaptureError> {
    match source {
        Some(s) => s.next_window(frames, engine),
        None => Ok(Vec::new()),
    }
}

enum SampleStream {
    Float(hound::WavIntoSamples<BufReader<File>, f32>),
    Int {
        samples: hound::WavIntoSamples<BufReader<File>, i32>,
        full_scale: f32,
    },
}

impl SampleStream {
    fn next_sample(&mut self) -> Option<Result<f32, hound::Error>> {
        match self {
            Self::Float(samples) => samples.next(),
            Self::Int {
                samples,
                full_scale,
            } => samples.next().map(|s| s.map(|v| v as f32 / *full_scale)),
        }
    }
}

/// One source file decoded window by window.
struct WindowedSource {
    stream: SampleStream,
    format: PcmFormat,
    ratio: f64,
    frames_left: u64,
}

impl WindowedSource {
    /// Open a source for windowed reading. Absent or empty inputs come
    /// back as `None` and later contribute silence.
    fn open(path: Option<&Path>, output_rate: f64) -> Result<Option<Self>, CaptureError> {
        let Some(path) = path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let reader = hound::WavReader::open(path)
            .map_err(|e| CaptureError::SetupFailed(format!("cannot read {:?}: {}", path, e)))?;
        let spec = reader.spec();
        let frames = u64::from(reader.duration());
        if frames == 0 {
            return Ok(None);
        }

        let format = PcmFormat::new(spec.sample_rate as f64, spec.channels);
        let stream = match spec.sample_format {
            hound::SampleFormat::Float => SampleStream::Float(reader.into_samples()),
            hound::SampleFormat::Int => SampleStream::Int {
                full_scale: ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32,
                samples: reader.into_samples(),
            },
        };

        Ok(Some(Self {
            stream,
            ratio: output_rate / format.sample_rate,
            format,
            frames_left: frames,
        }))
    }

    /// Decode and normalize the next window: up to `out_frames` frames
    /// of canonical stereo. Empty once the file is spent.
    fn next_window(
        &mut self,
        out_frames: usize,
        engine: &MixEngine,
    ) -> Result<Vec<f32>, CaptureError> {
        if self.frames_left == 0 {
            return Ok(Vec::new());
        }

        let rate_matched = (self.ratio - 1.0).abs() < 1e-9;
        let src_frames = if rate_matched {
            out_frames
        } else {
            (out_frames as f64 / self.ratio).ceil() as usize
        };
        let take = self.frames_left.min(src_frames as u64) as usize;
        let channels = self.format.channels.max(1) as usize;

        let mut samples = Vec::with_capacity(take * channels);
        for _ in 0..take * channels {
            match self.stream.next_sample() {
                Some(Ok(s)) => samples.push(s),
                Some(Err(e)) => {
                    return Err(CaptureError::SetupFailed(format!("decode failed: {}", e)))
                }
                None => break,
            }
        }
        self.frames_left = self
            .frames_left
            .saturating_sub((samples.len() / channels) as u64);
        if samples.len() < take * channels {
            // Header promised more frames than the stream held.
            self.frames_left = 0;
        }

        let mut stereo = engine.to_canonical_stereo(&samples, self.format);
        // Mid-file windows of a resampled source are pinned to the step
        // size so the two sources stay in frame lockstep.
        if !rate_matched && self.frames_left > 0 && stereo.len() > out_frames * 2 {
            stereo.truncate(out_frames * 2);
        }
        Ok(stereo)
    }
}
