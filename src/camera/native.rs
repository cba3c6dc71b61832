//! Physical camera backend built on nokhwa.
//!
//! nokhwa has no notion of facing mode, so each facing is mapped to a device
//! index from the configuration. The camera is opened inside a background
//! thread which keeps the most recent frame in a shared buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat as NokhwaFrameFormat, RequestedFormat,
    RequestedFormatType,
};
use nokhwa::Camera;

use super::backend::{CameraBackend, CameraStream};
use super::types::{CameraError, CameraFacing, Frame, Resolution, StreamRequest};

/// Frame rate requested alongside the ideal resolution.
const IDEAL_FPS: u32 = 30;

/// Information about an available camera device.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// Device index for selection
    pub index: u32,
    /// Human-readable device name
    pub name: String,
    /// Device description
    pub description: String,
}

impl std::fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ({})", self.index, self.name, self.description)
    }
}

/// List all camera devices. An empty list is not an error.
pub fn list_devices() -> Result<Vec<CameraInfo>, CameraError> {
    let devices =
        nokhwa::query(ApiBackend::Auto).map_err(|e| classify_error(&e.to_string()))?;

    Ok(devices
        .into_iter()
        .map(|d| CameraInfo {
            index: d.index().as_index().unwrap_or(0),
            name: d.human_name(),
            description: d.description().to_string(),
        })
        .collect())
}

/// Maps facing modes to device indices.
#[derive(Debug, Clone, Default)]
pub struct NativeBackend {
    pub user_device: Option<u32>,
    pub environment_device: Option<u32>,
}

impl NativeBackend {
    pub fn new(user_device: Option<u32>, environment_device: Option<u32>) -> Self {
        Self {
            user_device,
            environment_device,
        }
    }

    fn configured_device(&self, facing: CameraFacing) -> Option<u32> {
        match facing {
            CameraFacing::User => self.user_device,
            CameraFacing::Environment => self.environment_device,
        }
    }

    /// Pick a device for `request`, and whether it is known to match the facing.
    fn select_device(&self, request: &StreamRequest) -> Result<(u32, bool), CameraError> {
        let devices = list_devices()?;
        let first = devices.first().ok_or(CameraError::NoDevice)?.index;
        let configured = self.configured_device(request.facing);
        let exists = |index: u32| devices.iter().any(|d| d.index == index);

        match (request.exact, configured) {
            (true, Some(index)) if exists(index) => Ok((index, true)),
            (true, Some(index)) => Err(CameraError::DeviceNotFound(index)),
            (true, None) => Err(CameraError::OpenFailed(format!(
                "no device configured for facing mode '{}'",
                request.facing
            ))),
            (false, Some(index)) if exists(index) => Ok((index, true)),
            (false, _) => Ok((first, false)),
        }
    }
}

impl CameraBackend for NativeBackend {
    fn open(&mut self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        let (index, matches_facing) = self.select_device(request)?;
        let mut stream = NativeStream::start(index, request.ideal)?;
        stream.granted = matches_facing.then_some(request.facing);
        log::debug!("Opened camera device {} for {:?}", index, request);
        Ok(Box::new(stream))
    }
}

/// A running capture thread.
struct NativeStream {
    frame_buffer: Arc<Mutex<Option<Frame>>>,
    stop_signal: Arc<AtomicBool>,
    capture_thread: Option<JoinHandle<()>>,
    granted: Option<CameraFacing>,
}

impl NativeStream {
    /// Spawn the capture thread and wait until it reports the stream open.
    fn start(index: u32, ideal: Option<Resolution>) -> Result<Self, CameraError> {
        let frame_buffer = Arc::new(Mutex::new(None));
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (info_tx, info_rx) = mpsc::channel();

        let buffer = Arc::clone(&frame_buffer);
        let stop = Arc::clone(&stop_signal);
        let handle = thread::spawn(move || {
            run_capture_loop(index, ideal, buffer, stop, info_tx);
        });

        let outcome = info_rx.recv();
        let mut stream = Self {
            frame_buffer,
            stop_signal,
            capture_thread: Some(handle),
            granted: None,
        };

        match outcome {
            Ok(Ok(resolution)) => {
                log::info!("Camera {} streaming at {}", index, resolution);
                Ok(stream)
            }
            Ok(Err(e)) => {
                stream.stop();
                Err(e)
            }
            Err(_) => {
                stream.stop();
                Err(CameraError::StreamFailed(
                    "Capture thread terminated unexpectedly".to_string(),
                ))
            }
        }
    }
}

impl CameraStream for NativeStream {
    fn granted_facing(&self) -> Option<CameraFacing> {
        self.granted
    }

    fn latest_frame(&self) -> Option<Frame> {
        let buffer = self.frame_buffer.lock().ok()?;
        buffer.clone()
    }

    fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture_loop(
    index: u32,
    ideal: Option<Resolution>,
    buffer: Arc<Mutex<Option<Frame>>>,
    stop: Arc<AtomicBool>,
    info_tx: Sender<Result<Resolution, CameraError>>,
) {
    let mut camera = match open_camera(index, ideal) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = info_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = info_tx.send(Err(CameraError::StreamFailed(e.to_string())));
        return;
    }

    let res = camera.resolution();
    let _ = info_tx.send(Ok(Resolution {
        width: res.width(),
        height: res.height(),
    }));

    while !stop.load(Ordering::Relaxed) {
        if let Ok(raw) = camera.frame() {
            // Undecodable frames are skipped
            if let Ok(decoded) = raw.decode_image::<RgbFormat>() {
                let resolution = raw.resolution();
                let frame = Frame::new(decoded.into_raw(), resolution.width(), resolution.height());
                if let Ok(mut latest) = buffer.lock() {
                    *latest = Some(frame);
                }
            }
        }
        thread::sleep(Duration::from_millis(1));
    }

    let _ = camera.stop_stream();
}

/// Open with the ideal resolution if one was asked for, otherwise let the
/// device pick.
fn open_camera(index: u32, ideal: Option<Resolution>) -> Result<Camera, CameraError> {
    let mut attempts = Vec::new();
    if let Some(res) = ideal {
        let wanted = nokhwa::utils::Resolution::new(res.width, res.height);
        attempts.push(RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(wanted, NokhwaFrameFormat::MJPEG, IDEAL_FPS),
        )));
        attempts.push(RequestedFormat::new::<RgbFormat>(
            RequestedFormatType::HighestResolution(wanted),
        ));
    }
    attempts.push(RequestedFormat::new::<RgbFormat>(
        RequestedFormatType::AbsoluteHighestResolution,
    ));

    let mut last_error = String::from("no format attempted");
    for requested in attempts {
        match Camera::new(CameraIndex::Index(index), requested) {
            Ok(camera) => return Ok(camera),
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(classify_error(&last_error))
}

fn classify_error(message: &str) -> CameraError {
    let msg = message.to_lowercase();
    if msg.contains("permission")
        || msg.contains("denied")
        || msg.contains("authorization")
        || msg.contains("access")
    {
        CameraError::PermissionDenied
    } else {
        CameraError::OpenFailed(message.to_string())
    }
}
