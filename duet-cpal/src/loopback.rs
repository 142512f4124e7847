use cpal::traits::{DeviceTrait, HostTrait};

use duet_core::{
    AudioBufferCallback, CaptureError, CaptureProvider, DeviceInfo, PcmFormat, SourceKind,
};

use crate::stream::StreamWorker;

/// Input-device names that expose the system playback signal.
const MONITOR_HINTS: &[&str] = &[
    "monitor",
    "loopback",
    "stereo mix",
    "what u hear",
    "blackhole",
    "soundflower",
];

/// System-audio capture via a monitor/loopback input device.
///
/// Desktop audio servers expose playback as a recordable input (a
/// PulseAudio/PipeWire monitor source, WASAPI "Stereo Mix", or a virtual
/// device such as BlackHole). This provider records from the first such
/// device, or from an explicitly pinned one.
pub struct CpalLoopbackCapture {
    device_id: Option<String>,
    worker: Option<StreamWorker>,
}

impl CpalLoopbackCapture {
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            device_id,
            worker: None,
        }
    }

    fn find_device(&self) -> Result<cpal::Device, CaptureError> {
        select_monitor(self.device_id.as_deref())
    }
}

pub(crate) fn looks_like_monitor(name: &str) -> bool {
    let lower = name.to_lowercase();
    MONITOR_HINTS.iter().any(|hint| lower.contains(hint))
}

pub(crate) fn select_monitor(device_id: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    let devices = host.input_devices().map_err(|e| {
        CaptureError::CaptureEngineError(format!("cannot enumerate input devices: {}", e))
    })?;

    for device in devices {
        let Ok(name) = device.name() else { continue };
        match device_id {
            Some(id) => {
                if name == id {
                    return Ok(device);
                }
            }
            None => {
                if looks_like_monitor(&name) {
                    return Ok(device);
                }
            }
        }
    }

    if device_id.is_some() {
        return Err(CaptureError::NoAudioDeviceFound);
    }
    log::warn!(
        "no monitor/loopback input found; system capture needs a monitor \
         source or a virtual loopback device"
    );
    Err(CaptureError::NoDisplayFound)
}

impl CaptureProvider for CpalLoopbackCapture {
    fn is_available(&self) -> bool {
        self.find_device().is_ok()
    }

    fn native_format(&self) -> PcmFormat {
        self.find_device()
            .ok()
            .and_then(|d| d.default_input_config().ok())
            .map(|c| PcmFormat::new(c.sample_rate().0 as f64, c.channels()))
            .unwrap_or_else(PcmFormat::canonical)
    }

    fn start(&mut self, callback: AudioBufferCallback) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::RecordingInProgress);
        }
        let device_id = self.device_id.clone();
        let worker = StreamWorker::spawn(
            "cpal-loopback",
            move || select_monitor(device_id.as_deref()),
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
            .unwrap_or_else(|| "unavailable monitor".to_string());
        DeviceInfo {
            id: self
                .device_id
                .clone()
                .unwrap_or_else(|| format!("monitor:{}", name)),
            name,
            kind: SourceKind::System,
            is_default: self.device_id.is_none(),
        }
    }
}
