//! Signal-generator capture source.
//!
//! Stands in for the OS tap/aggregate plumbing, which this crate keeps
//! behind an explicit simulation boundary, and doubles as the
//! deterministic source for session tests. Mirrors the lifecycle rules
//! of a hardware provider: one engine per instance, start-while-running
//! is an error, stop is idempotent and safe on the error path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::models::pcm::PcmFormat;
use crate::models::source::{DeviceInfo, SourceKind};
use crate::traits::capture_provider::{AudioBufferCallback, CaptureProvider};

use super::context::CaptureContext;

/// What the generator produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestSignal {
    Silence,
    /// Every sample holds this value.
    Constant(f32),
    Sine { frequency: f64, amplitude: f32 },
}

/// How buffers are delivered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delivery {
    /// Emit `buffers` buffers back to back, then idle until stopped.
    Burst { buffers: usize },
    /// Emit one buffer every `interval` until stopped.
    Paced { interval: Duration },
}

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub kind: SourceKind,
    pub signal: TestSignal,
    pub format: PcmFormat,
    pub frames_per_buffer: usize,
    pub delivery: Delivery,
    /// System-role precondition: whether a capturable display/output
    /// context exists. Ignored for microphone sources.
    pub display_attached: bool,
}

impl SyntheticConfig {
    pub fn system(signal: TestSignal) -> Self {
        Self {
            kind: SourceKind::System,
            signal,
            format: PcmFormat::canonical(),
            frames_per_buffer: 1024,
            delivery: Delivery::Burst { buffers: 8 },
            display_attached: true,
        }
    }

    pub fn microphone(signal: TestSignal) -> Self {
        Self {
            kind: SourceKind::Microphone,
            signal,
            format: PcmFormat::mono(44_100.0),
            frames_per_buffer: 1024,
            delivery: Delivery::Burst { buffers: 8 },
            display_attached: true,
        }
    }
}

/// Deterministic capture source producing a fixed signal.
pub struct SyntheticCapture {
    config: SyntheticConfig,
    context: Arc<Mutex<CaptureContext>>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SyntheticCapture {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            context: Arc::new(Mutex::new(CaptureContext::NotConfigured)),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn context(&self) -> CaptureContext {
        self.context.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn label(&self) -> &'static str {
        match self.config.kind {
            SourceKind::System => "system",
            SourceKind::Microphone => "microphone",
        }
    }
}

impl CaptureProvider for SyntheticCapture {
    fn is_available(&self) -> bool {
        true
    }

    fn native_format(&self) -> PcmFormat {
        self.config.format
    }

    fn start(&mut self, callback: AudioBufferCallback) -> Result<(), CaptureError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::RecordingInProgress);
        }

        if self.config.kind == SourceKind::System && !self.config.display_attached {
            self.running.store(false, Ordering::SeqCst);
            return Err(CaptureError::NoDisplayFound);
        }

        *self.context.lock() = CaptureContext::tap_for(self.label(), self.config.format);

        let running = Arc::clone(&self.running);
        let config = self.config.clone();

        let handle = thread::Builder::new()
            .name(format!("synthetic-{}", self.label()))
            .spawn(move || generator_loop(&config, &running, callback))
            .map_err(|e| {
                CaptureError::CaptureEngineError(format!("failed to spawn generator thread: {}", e))
            });

        let handle = match handle {
            Ok(h) => h,
            Err(e) => {
                // Partial start heals through the stop path.
                self.running.store(false, Ordering::SeqCst);
                *self.context.lock() = CaptureContext::NotConfigured;
                return Err(e);
            }
        };

        *self.handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        *self.context.lock() = CaptureContext::NotConfigured;
        Ok(())
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            id: format!("synthetic-{}", self.label()),
            name: format!("Synthetic {}", self.label()),
            kind: self.config.kind,
            is_default: true,
        }
    }
}

fn generator_loop(config: &SyntheticConfig, running: &AtomicBool, callback: AudioBufferCallback) {
    let channels = config.format.channels as usize;
    let samples_per_buffer = config.frames_per_buffer * channels;
    let mut frame_index: u64 = 0;

    let mut emit = |frame_index: &mut u64| {
        let mut samples = vec![0.0f32; samples_per_buffer];
        match config.signal {
            TestSignal::Silence => {}
            TestSignal::Constant(value) => samples.fill(value),
            TestSignal::Sine {
                frequency,
                amplitude,
            } => {
                for frame in 0..config.frames_per_buffer {
                    let t = (*frame_index + frame as u64) as f64 / config.format.sample_rate;
                    let value =
                        amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin() as f32;
                    for ch in 0..channels {
                        samples[frame * channels + ch] = value;
                    }
                }
            }
        }
        *frame_index += config.frames_per_buffer as u64;
        callback(&samples, config.format.sample_rate, config.format.channels);
    };

    match config.delivery {
        Delivery::Burst { buffers } => {
            for _ in 0..buffers {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                emit(&mut frame_index);
            }
            while running.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(5));
            }
        }
        Delivery::Paced { interval } => {
            while running.load(Ordering::SeqCst) {
                emit(&mut frame_index);
                thread::sleep(interval);
            }
        }
    }
}
