/// OS permission state for a capture category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    NotDetermined,
    Denied,
}

/// Pass/fail view of the platform permission subsystem.
///
/// The recording core only consumes outcomes; prompting the user and
/// mutating persistent OS permission state happen behind this trait.
/// Requests may block while a prompt is shown — there is no timeout.
pub trait PermissionGate: Send + Sync {
    fn screen_capture_granted(&self) -> bool;

    /// Trigger the one-time prompt if the platform offers one; returns
    /// the resulting grant state.
    fn request_screen_capture(&self) -> bool;

    fn microphone_status(&self) -> PermissionStatus;

    fn request_microphone(&self) -> bool;
}

/// Gate that grants everything. Default for tests and headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn screen_capture_granted(&self) -> bool {
        true
    }

    fn request_screen_capture(&self) -> bool {
        true
    }

    fn microphone_status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    fn request_microphone(&self) -> bool {
        true
    }
}
