pub mod capture_provider;
pub mod permission_gate;
pub mod session_delegate;
