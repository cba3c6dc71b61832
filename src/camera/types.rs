//! Camera types and data structures.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Which physical camera a capture session targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    /// Front camera, facing the person holding the device
    User,
    /// Rear camera, facing the surroundings
    #[default]
    Environment,
}

impl CameraFacing {
    /// The other camera.
    pub fn toggled(self) -> Self {
        match self {
            CameraFacing::User => CameraFacing::Environment,
            CameraFacing::Environment => CameraFacing::User,
        }
    }
}

impl fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraFacing::User => write!(f, "user"),
            CameraFacing::Environment => write!(f, "environment"),
        }
    }
}

/// Camera resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// 640x480, the basis used when a frame reports no dimensions
    pub const VGA: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    /// 1280x720, the ideal capture resolution
    pub const HD: Resolution = Resolution {
        width: 1280,
        height: 720,
    };
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// What a backend is asked to open.
///
/// The exact form pins the facing mode and carries the ideal resolution.
/// The relaxed form only expresses a facing preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing: CameraFacing,
    pub exact: bool,
    pub ideal: Option<Resolution>,
}

impl StreamRequest {
    pub fn exact(facing: CameraFacing) -> Self {
        Self {
            facing,
            exact: true,
            ideal: Some(Resolution::HD),
        }
    }

    pub fn relaxed(facing: CameraFacing) -> Self {
        Self {
            facing,
            exact: false,
            ideal: None,
        }
    }
}

/// A captured camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data, RGB, 3 bytes per pixel, row-major
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl Frame {
    pub const BYTES_PER_PIXEL: usize = 3;

    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// True when the frame carries usable dimensions and enough pixels for them.
    pub fn has_dimensions(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() >= self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL
    }
}

/// Errors that can occur while acquiring or running a camera.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("No camera found")]
    NoDevice,

    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Camera device {0} not found. Run 'list-cameras' to see available devices")]
    DeviceNotFound(u32),

    #[error("Failed to open camera: {0}")]
    OpenFailed(String),

    #[error("Failed to start camera stream: {0}")]
    StreamFailed(String),
}
