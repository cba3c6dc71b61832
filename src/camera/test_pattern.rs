//! Synthetic camera used when no physical device is configured.

use std::time::Instant;

use super::backend::{CameraBackend, CameraStream};
use super::types::{CameraError, CameraFacing, Frame, Resolution, StreamRequest};

/// Backend that always succeeds and renders a moving gradient.
#[derive(Debug, Default)]
pub struct TestPatternBackend;

impl CameraBackend for TestPatternBackend {
    fn open(&mut self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        let resolution = request.ideal.unwrap_or(Resolution::VGA);
        Ok(Box::new(TestPatternStream {
            facing: request.facing,
            resolution,
            started: Instant::now(),
            stopped: false,
        }))
    }
}

struct TestPatternStream {
    facing: CameraFacing,
    resolution: Resolution,
    started: Instant,
    stopped: bool,
}

impl CameraStream for TestPatternStream {
    fn granted_facing(&self) -> Option<CameraFacing> {
        Some(self.facing)
    }

    fn latest_frame(&self) -> Option<Frame> {
        if self.stopped {
            return None;
        }
        let shift = (self.started.elapsed().as_millis() / 40) as u32;
        Some(gradient(self.resolution, shift))
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Diagonal RGB gradient scrolled by `shift` pixels.
fn gradient(resolution: Resolution, shift: u32) -> Frame {
    let Resolution { width, height } = resolution;
    let mut data = Vec::with_capacity(width as usize * height as usize * Frame::BYTES_PER_PIXEL);
    let span = width.max(1);
    for y in 0..height {
        for x in 0..width {
            let xs = (x + shift % span) % span;
            data.push((xs * 255 / span) as u8);
            data.push((y * 255 / height.max(1)) as u8);
            data.push(((xs + y) % 256) as u8);
        }
    }
    Frame::new(data, width, height)
}
