use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};

use duet_core::{AudioBufferCallback, CaptureError};

/// Owns a cpal input stream on a dedicated thread.
///
/// `cpal::Stream` is not `Send`, so the stream is built, played, and
/// dropped without ever leaving the worker thread; setup errors travel
/// back to the caller over a channel before `spawn` returns.
pub(crate) struct StreamWorker {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StreamWorker {
    pub(crate) fn spawn<F>(
        thread_name: &str,
        select_device: F,
        callback: AudioBufferCallback,
    ) -> Result<Self, CaptureError>
    where
        F: FnOnce() -> Result<cpal::Device, CaptureError> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let worker_running = Arc::clone(&running);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();

        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                let stream = match open_stream(select_device, callback) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                while worker_running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(20));
                }
                drop(stream);
            })
            .map_err(|e| {
                CaptureError::CaptureEngineError(format!("failed to spawn stream thread: {}", e))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                running,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::CaptureEngineError(
                    "stream thread exited before reporting readiness".into(),
                ))
            }
        }
    }

    pub(crate) fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StreamWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_stream<F>(
    select_device: F,
    callback: AudioBufferCallback,
) -> Result<cpal::Stream, CaptureError>
where
    F: FnOnce() -> Result<cpal::Device, CaptureError>,
{
    let device = select_device()?;
    let supported = device.default_input_config().map_err(|e| {
        CaptureError::CaptureEngineError(format!("no default input config: {}", e))
    })?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.config();
    let sample_rate = config.sample_rate.0 as f64;
    let channels = config.channels;

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &config, sample_rate, channels, callback)
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(&device, &config, sample_rate, channels, callback)
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(&device, &config, sample_rate, channels, callback)
        }
        other => {
            return Err(CaptureError::CaptureEngineError(format!(
                "unsupported sample format: {}",
                other
            )))
        }
    }
    .map_err(|e| CaptureError::CaptureEngineError(format!("failed to build input stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| CaptureError::CaptureEngineError(format!("failed to start stream: {}", e)))?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_rate: f64,
    channels: u16,
    callback: AudioBufferCallback,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data.iter().map(|&s| f32::from_sample(s)).collect();
            callback(&samples, sample_rate, channels);
        },
        |err| log::error!("input stream error: {}", err),
        None,
    )
}
