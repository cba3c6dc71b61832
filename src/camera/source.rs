//! Capture source: owns at most one live camera session.

use super::backend::{CameraBackend, CameraStream};
use super::types::{CameraError, CameraFacing, Frame, StreamRequest};

/// A live camera stream plus what the device actually granted.
pub struct CaptureSession {
    stream: Box<dyn CameraStream>,
    requested: CameraFacing,
    granted: Option<CameraFacing>,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("requested", &self.requested)
            .field("granted", &self.granted)
            .finish_non_exhaustive()
    }
}

impl CaptureSession {
    /// Facing mode that was asked for.
    pub fn requested_facing(&self) -> CameraFacing {
        self.requested
    }

    /// Facing mode the device reported, which may differ from the request.
    pub fn granted_facing(&self) -> Option<CameraFacing> {
        self.granted
    }

    /// Frames from a user-facing camera are flipped to look like a mirror.
    pub fn mirrored(&self) -> bool {
        self.granted == Some(CameraFacing::User)
    }

    /// Latest frame from the stream.
    pub fn frame(&self) -> Option<Frame> {
        self.stream.latest_frame()
    }

    fn stop(&mut self) {
        self.stream.stop();
    }
}

/// Acquires and releases camera streams with facing-mode fallback.
pub struct CaptureSource {
    backend: Box<dyn CameraBackend>,
    session: Option<CaptureSession>,
}

impl CaptureSource {
    pub fn new(backend: Box<dyn CameraBackend>) -> Self {
        Self {
            backend,
            session: None,
        }
    }

    /// Acquire a stream for `facing`.
    ///
    /// Any held session is stopped first. The exact request (pinned facing,
    /// ideal 1280x720) is tried before a relaxed one carrying only the facing
    /// preference; the relaxed attempt's error is the one reported.
    pub fn acquire(&mut self, facing: CameraFacing) -> Result<&CaptureSession, CameraError> {
        self.release();

        let stream = match self.backend.open(&StreamRequest::exact(facing)) {
            Ok(stream) => stream,
            Err(e) => {
                log::debug!(
                    "Exact '{}' camera request failed ({}), retrying relaxed",
                    facing,
                    e
                );
                self.backend.open(&StreamRequest::relaxed(facing))?
            }
        };

        let granted = stream.granted_facing();
        log::info!(
            "Camera acquired: requested {}, granted {}",
            facing,
            granted.map_or_else(|| "unknown".to_string(), |g| g.to_string())
        );

        Ok(&*self.session.insert(CaptureSession {
            stream,
            requested: facing,
            granted,
        }))
    }

    /// Stop and drop the current session. No-op without one.
    pub fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
            log::debug!("Camera session released ({})", session.requested);
        }
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.session.is_some()
    }

    /// Latest frame of the live session.
    pub fn frame(&self) -> Option<Frame> {
        self.session.as_ref().and_then(CaptureSession::frame)
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        requests: Vec<StreamRequest>,
        live: usize,
        stopped: usize,
    }

    struct FakeStream {
        granted: Option<CameraFacing>,
        log: Rc<RefCell<Log>>,
        stopped: bool,
    }

    impl CameraStream for FakeStream {
        fn granted_facing(&self) -> Option<CameraFacing> {
            self.granted
        }

        fn latest_frame(&self) -> Option<Frame> {
            Some(Frame::new(vec![0; 12], 2, 2))
        }

        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                let mut log = self.log.borrow_mut();
                log.live -= 1;
                log.stopped += 1;
            }
        }
    }

    /// Fails exact requests when `reject_exact` is set, everything when `deny` is set.
    struct FakeBackend {
        log: Rc<RefCell<Log>>,
        reject_exact: bool,
        deny: bool,
    }

    impl CameraBackend for FakeBackend {
        fn open(&mut self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError> {
            self.log.borrow_mut().requests.push(*request);
            if self.deny {
                return Err(CameraError::PermissionDenied);
            }
            if request.exact && self.reject_exact {
                return Err(CameraError::OpenFailed("overconstrained".to_string()));
            }
            self.log.borrow_mut().live += 1;
            let granted = if request.exact { Some(request.facing) } else { None };
            Ok(Box::new(FakeStream {
                granted,
                log: Rc::clone(&self.log),
                stopped: false,
            }))
        }
    }

    fn source(reject_exact: bool, deny: bool) -> (CaptureSource, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let backend = FakeBackend {
            log: Rc::clone(&log),
            reject_exact,
            deny,
        };
        (CaptureSource::new(Box::new(backend)), log)
    }

    #[test]
    fn test_acquire_exact_succeeds_first() {
        let (mut source, log) = source(false, false);
        let session = source.acquire(CameraFacing::User).unwrap();
        assert_eq!(session.granted_facing(), Some(CameraFacing::User));
        assert!(session.mirrored());
        assert_eq!(log.borrow().requests, vec![StreamRequest::exact(CameraFacing::User)]);
    }

    #[test]
    fn test_acquire_falls_back_to_relaxed() {
        let (mut source, log) = source(true, false);
        let session = source.acquire(CameraFacing::Environment).unwrap();
        assert_eq!(session.requested_facing(), CameraFacing::Environment);
        assert_eq!(session.granted_facing(), None);
        assert!(!session.mirrored());
        assert_eq!(
            log.borrow().requests,
            vec![
                StreamRequest::exact(CameraFacing::Environment),
                StreamRequest::relaxed(CameraFacing::Environment),
            ]
        );
    }

    #[test]
    fn test_acquire_permission_denied_leaves_no_session() {
        let (mut source, log) = source(false, true);
        let result = source.acquire(CameraFacing::User);
        assert!(matches!(result, Err(CameraError::PermissionDenied)));
        assert!(!source.is_live());
        assert_eq!(log.borrow().requests.len(), 2);
    }

    #[test]
    fn test_reacquire_keeps_single_live_session() {
        let (mut source, log) = source(false, false);
        source.acquire(CameraFacing::Environment).unwrap();
        source.acquire(CameraFacing::User).unwrap();
        source.acquire(CameraFacing::Environment).unwrap();
        assert_eq!(log.borrow().live, 1);
        assert_eq!(log.borrow().stopped, 2);
    }

    #[test]
    fn test_failed_reacquire_releases_old_session() {
        let (mut source, log) = source(false, false);
        source.acquire(CameraFacing::Environment).unwrap();
        source.backend = Box::new(FakeBackend {
            log: Rc::clone(&log),
            reject_exact: false,
            deny: true,
        });
        assert!(source.acquire(CameraFacing::User).is_err());
        assert!(!source.is_live());
        assert_eq!(log.borrow().live, 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (mut source, log) = source(false, false);
        source.release();
        source.acquire(CameraFacing::User).unwrap();
        source.release();
        source.release();
        assert!(!source.is_live());
        assert!(source.frame().is_none());
        assert_eq!(log.borrow().stopped, 1);
    }
}
