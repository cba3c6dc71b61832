//! Seams between the capture source and whatever produces frames.

use super::types::{CameraError, CameraFacing, Frame, StreamRequest};

/// A camera driver able to open streams.
pub trait CameraBackend {
    /// Open a stream satisfying `request`.
    ///
    /// May block while the platform asks for camera permission or the device
    /// spins up.
    fn open(&mut self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// A live stream handed out by a [`CameraBackend`].
pub trait CameraStream {
    /// Facing mode actually granted by the device, if it reports one.
    fn granted_facing(&self) -> Option<CameraFacing>;

    /// Most recent frame, or `None` if the device has not produced one yet.
    fn latest_frame(&self) -> Option<Frame>;

    /// Stop all tracks. Calling it again is a no-op.
    fn stop(&mut self);
}
