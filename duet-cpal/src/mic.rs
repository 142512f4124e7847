use cpal::traits::{DeviceTrait, HostTrait};

use duet_core::{
    AudioBufferCallback, CaptureError, CaptureProvider, DeviceInfo, PcmFormat, SourceKind,
    CANONICAL_SAMPLE_RATE,
};

use crate::stream::StreamWorker;

/// Microphone capture through the host's default audio API.
///
/// A `device_id` of `None` follows the system default input; a specific
/// id pins the stream to the device with that cpal name.
pub struct CpalMicCapture {
    device_id: Option<String>,
    worker: Option<StreamWorker>,
}

impl CpalMicCapture {
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            device_id,
            worker: None,
        }
    }

    fn find_device(&self) -> Result<cpal::Device, CaptureError> {
        select_microphone(self.device_id.as_deref())
    }
}

pub(crate) fn select_microphone(device_id: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match device_id {
        Some(id) => host
            .input_devices()
            .map_err(|e| {
                CaptureError::CaptureEngineError(format!("cannot enumerate input devices: {}", e))
            })?
            .find(|d| d.name().map(|n| n == id).unwrap_or(false))
            .ok_or(CaptureError::NoAudioDeviceFound),
        None => host
            .default_input_device()
            .ok_or(CaptureError::NoAudioDeviceFound),
    }
}

impl CaptureProvider for CpalMicCapture {
    fn is_available(&self) -> bool {
        self.find_device().is_ok()
    }

    fn native_format(&self) -> PcmFormat {
        self.find_device()
            .ok()
            .and_then(|d| d.default_input_config().ok())
            .map(|c| PcmFormat::new(c.sample_rate().0 as f64, c.channels()))
            .unwrap_or_else(|| PcmFormat::mono(CANONICAL_SAMPLE_RATE))
    }

    fn start(&mut self, callback: AudioBufferCallback) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::RecordingInProgress);
        }
        let device_id = self.device_id.clone();
        let worker = StreamWorker::spawn(
            "cpal-mic",
            move || select_microphone(device_id.as_deref()),
            callback,
        )?;
        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        Ok(())
    }

    fn device_info(&self) -> DeviceInfo {
        let name = self
            .find_device()
            .ok()
            .and_then(|d| d.name().ok())
            .unwrap_or_else(|| "unavailable input".to_string());
        DeviceInfo {
            id: self
                .device_id
                .clone()
                .unwrap_or_else(|| format!("default-input:{}", name)),
            name,
            kind: SourceKind::Microphone,
            is_default: self.device_id.is_none(),
        }
    }
}
