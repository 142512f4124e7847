//! Desktop capture backend for `duet-core`, built on cpal.
//!
//! Provides the two capture roles of a recording session:
//! [`CpalMicCapture`] for the microphone and [`CpalLoopbackCapture`]
//! for the system playback signal via a monitor/loopback input device.

use cpal::traits::{DeviceTrait, HostTrait};

use duet_core::{
    CaptureError, DeviceInfo, RecorderConfig, RecordingController, SourceKind,
};

mod loopback;
mod mic;
mod permissions;
mod stream;

pub use loopback::CpalLoopbackCapture;
pub use mic::CpalMicCapture;
pub use permissions::DesktopPermissionGate;

/// A recording controller wired to the host's audio devices.
/// `config.mic_device_id` pins the microphone; the system source always
/// uses the first monitor/loopback input.
pub fn desktop_recorder(
    config: RecorderConfig,
) -> RecordingController<CpalLoopbackCapture, CpalMicCapture> {
    let system = CpalLoopbackCapture::new(None);
    let microphone = CpalMicCapture::new(config.mic_device_id.clone());
    let mut controller = RecordingController::new(system, microphone, config);
    controller.set_permission_gate(std::sync::Arc::new(DesktopPermissionGate));
    controller
}

/// Enumerate the host's input devices, tagging monitor/loopback sources
/// as system-capture candidates.
pub fn list_input_devices() -> Result<Vec<DeviceInfo>, CaptureError> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok());
    let devices = host.input_devices().map_err(|e| {
        CaptureError::CaptureEngineError(format!("cannot enumerate input devices: {}", e))
    })?;

    let mut found = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else { continue };
        let kind = if loopback::looks_like_monitor(&name) {
            SourceKind::System
        } else {
            SourceKind::Microphone
        };
        found.push(DeviceInfo {
            is_default: default_name.as_deref() == Some(&name),
            id: name.clone(),
            name,
            kind,
        });
    }
    Ok(found)
}
