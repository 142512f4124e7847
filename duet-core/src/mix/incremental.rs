use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::models::source::SessionDiagnostics;
use crate::processing::mixer::MixEngine;
use crate::sink::memory_sink::MemorySink;
use crate::storage::wav_writer::{FinalizedWav, WavWriter};

/// Live mixing of the two source streams.
///
/// A background thread drains both memory sinks in fixed chunks, mixes
/// them with the standard gain formula, and appends the result straight
/// to the output file, so long recordings never accumulate in memory.
/// The system stream drives chunk timing; buffers are paired by arrival
/// order, not by hardware timestamp.
pub struct IncrementalMixer {
    system: Arc<MemorySink>,
    mic: Arc<MemorySink>,
    writer: Arc<Mutex<Option<WavWriter>>>,
    engine: MixEngine,
    bit_depth: u16,
    chunk_frames: usize,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    diagnostics: Arc<Mutex<SessionDiagnostics>>,
}

impl IncrementalMixer {
    /// Create the output file and start the mix loop.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        output: PathBuf,
        output_rate: f64,
        bit_depth: u16,
        chunk_frames: usize,
        interval: Duration,
        system: Arc<MemorySink>,
        mic: Arc<MemorySink>,
        diagnostics: Arc<Mutex<SessionDiagnostics>>,
    ) -> Result<Self, CaptureError> {
        let writer = WavWriter::create(output, output_rate as u32, 2, bit_depth)?;
        let writer = Arc::new(Mutex::new(Some(writer)));
        let engine = MixEngine::new(output_rate);
        let running = Arc::new(AtomicBool::new(true));

        let loop_running = Arc::clone(&running);
        let loop_system = Arc::clone(&system);
        let loop_mic = Arc::clone(&mic);
        let loop_writer = Arc::clone(&writer);
        let loop_engine = engine.clone();
        let loop_diag = Arc::clone(&diagnostics);
        let chunk = chunk_frames.max(1);

        let handle = thread::Builder::new()
            .name("incremental-mixer".into())
            .spawn(move || {
                while loop_running.load(Ordering::SeqCst) {
                    thread::sleep(interval);
                    mix_chunk(
                        &loop_system,
                        &loop_mic,
                        &loop_writer,
                        &loop_engine,
                        bit_depth,
                        chunk,
                        &loop_diag,
                    );
                }
            })
            .map_err(|e| {
                CaptureError::SetupFailed(format!("failed to spawn mixer thread: {}", e))
            })?;

        Ok(Self {
            system,
            mic,
            writer,
            engine,
            bit_depth,
            chunk_frames: chunk,
            running,
            handle: Mutex::new(Some(handle)),
            diagnostics,
        })
    }

    /// Stop the loop, drain what both sinks still hold, and close the
    /// output file.
    pub fn finish(&self) -> Result<FinalizedWav, CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }

        // Final flush: keep draining until both sinks are empty, not
        // just until the system stream runs dry.
        while self.system.available_frames() > 0 || self.mic.available_frames() > 0 {
            let frames = self
                .chunk_frames
                .min(self.system.available_frames().max(self.mic.available_frames()));
            let system_window = self.system.drain(frames);
            let mic_window = self.mic.drain(frames);
            if system_window.is_empty() && mic_window.is_empty() {
                break;
            }
            let mixed = self.engine.mix_stereo_windows(&system_window, &mic_window);
            let bytes = MixEngine::pcm_bytes(&mixed, self.bit_depth);
            if let Some(writer) = self.writer.lock().as_mut() {
                writer.write_pcm(&bytes)?;
            }
            let mut diag = self.diagnostics.lock();
            diag.mix_cycles += 1;
            diag.bytes_written += bytes.len() as u64;
        }

        let writer = self
            .writer
            .lock()
            .take()
            .ok_or_else(|| CaptureError::StorageError("mixer output already finalized".into()))?;
        writer.finalize()
    }
}

/// One steady-state mix cycle: the system stream decides how many frames
/// advance, the mic contributes what it has and silence for the rest.
fn mix_chunk(
    system: &MemorySink,
    mic: &MemorySink,
    writer: &Mutex<Option<WavWriter>>,
    engine: &MixEngine,
    bit_depth: u16,
    chunk_frames: usize,
    diagnostics: &Mutex<SessionDiagnostics>,
) {
    let frames = system.available_frames().min(chunk_frames);
    if frames == 0 {
        return;
    }

    let system_window = system.drain(frames);
    let mic_window = mic.drain(frames);
    let mixed = engine.mix_stereo_windows(&system_window, &mic_window);
    let bytes = MixEngine::pcm_bytes(&mixed, bit_depth);

    if let Some(writer) = writer.lock().as_mut() {
        if let Err(e) = writer.write_pcm(&bytes) {
            log::error!("mixed chunk write failed: {}", e);
            diagnostics.lock().dropped_writes += 1;
            return;
        }
    }

    let mut diag = diagnostics.lock();
    diag.mix_cycles += 1;
    diag.bytes_written += bytes.len() as u64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pcm::PcmBuffer;
    use crate::sink::BufferSink;
    use std::fs;

    const RATE: f64 = 44_100.0;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("duet_live_{}_{}", std::process::id(), name))
    }

    fn stereo_buffer(value: f32, frames: usize) -> PcmBuffer {
        PcmBuffer::copy_from(&vec![value; frames * 2], RATE, 2, Duration::ZERO)
    }

    #[test]
    fn live_mix_applies_gains_and_flushes_on_finish() {
        let out = temp_path("gains.wav");
        let system = Arc::new(MemorySink::new(RATE, 44_100));
        let mic = Arc::new(MemorySink::new(RATE, 44_100));
        let diag = Arc::new(Mutex::new(SessionDiagnostics::default()));

        let mixer = IncrementalMixer::start(
            out.clone(),
            RATE,
            16,
            1024,
            Duration::from_millis(10),
            Arc::clone(&system),
            Arc::clone(&mic),
            Arc::clone(&diag),
        )
        .unwrap();

        system.write(&stereo_buffer(0.4, 2048));
        mic.write(&stereo_buffer(0.2, 2048));

        let done = mixer.finish().unwrap();
        assert_eq!(done.frames, 2048);

        let samples: Vec<f32> = hound::WavReader::open(&out)
            .unwrap()
            .into_samples::<i16>()
            .map(|s| s.unwrap() as f32 / i16::MAX as f32)
            .collect();
        for &s in &samples {
            assert!((s - 0.4).abs() < 1e-3, "expected 0.4, got {}", s);
        }
        assert!(diag.lock().mix_cycles > 0);

        fs::remove_file(&out).ok();
    }

    #[test]
    fn mic_tail_survives_system_running_dry() {
        let out = temp_path("tail.wav");
        let system = Arc::new(MemorySink::new(RATE, 44_100));
        let mic = Arc::new(MemorySink::new(RATE, 44_100));
        let diag = Arc::new(Mutex::new(SessionDiagnostics::default()));

        let mixer = IncrementalMixer::start(
            out.clone(),
            RATE,
            16,
            512,
            Duration::from_millis(500), // loop effectively never fires
            Arc::clone(&system),
            Arc::clone(&mic),
            diag,
        )
        .unwrap();

        system.write(&stereo_buffer(0.4, 512));
        mic.write(&stereo_buffer(0.2, 1024));

        let done = mixer.finish().unwrap();
        assert_eq!(done.frames, 1024);

        fs::remove_file(&out).ok();
    }
}
