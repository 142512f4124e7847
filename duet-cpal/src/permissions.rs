use cpal::traits::HostTrait;

use duet_core::{PermissionGate, PermissionStatus};

/// Permission gate for desktop hosts.
///
/// The audio APIs cpal wraps on desktop (ALSA/PulseAudio/PipeWire,
/// WASAPI, CoreAudio) have no user-space prompt flow of their own; the
/// OS either grants device access to the process or the device simply
/// is not there. Microphone status therefore mirrors device presence,
/// and capture of the playback signal is treated as granted, failing
/// later as `NoAudioDeviceFound` when no monitor source exists.
pub struct DesktopPermissionGate;

impl PermissionGate for DesktopPermissionGate {
    fn screen_capture_granted(&self) -> bool {
        true
    }

    fn request_screen_capture(&self) -> bool {
        true
    }

    fn microphone_status(&self) -> PermissionStatus {
        if cpal::default_host().default_input_device().is_some() {
            PermissionStatus::Granted
        } else {
            PermissionStatus::NotDetermined
        }
    }

    fn request_microphone(&self) -> bool {
        cpal::default_host().default_input_device().is_some()
    }
}
