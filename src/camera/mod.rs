//! Camera acquisition and frame access.
//!
//! This module provides:
//! - The [`CaptureSource`] holding at most one live [`CaptureSession`]
//! - Backend seams via [`CameraBackend`] and [`CameraStream`]
//! - A synthetic [`TestPatternBackend`]
//! - A nokhwa-based `NativeBackend` behind the `native-camera` feature

mod backend;
#[cfg(feature = "native-camera")]
mod native;
mod source;
mod test_pattern;
mod types;

pub use backend::{CameraBackend, CameraStream};
#[cfg(feature = "native-camera")]
pub use native::{list_devices, CameraInfo, NativeBackend};
pub use source::{CaptureSession, CaptureSource};
pub use test_pattern::TestPatternBackend;
pub use types::{CameraError, CameraFacing, Frame, Resolution, StreamRequest};
