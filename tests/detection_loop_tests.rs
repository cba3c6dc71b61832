//! End-to-end tests for the detection loop against a mock detection server.
//!
//! These tests cover:
//! - Guidance delivery and spoken-once deduplication
//! - Stopping on server and application errors
//! - Camera switching and acquisition failures
//! - The timer-driven `run` loop, including the in-flight drop policy

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use guide_cam::actions::UserAction;
use guide_cam::camera::{
    CameraBackend, CameraError, CameraFacing, CameraStream, CaptureSource, Frame, StreamRequest,
    TestPatternBackend,
};
use guide_cam::detection::DetectionClient;
use guide_cam::detection_loop::{
    DetectionLoop, LoopError, LoopState, TickOutcome, STATUS_CAMERA_FAILED,
    STATUS_CONNECTION_ERROR,
};
use guide_cam::notify::{NotificationPolicy, NotifyOutcome, Speaker};
use guide_cam::status::{Status, StatusSink};

// === Test doubles ===

#[derive(Clone, Default)]
struct StatusLog(Rc<RefCell<Vec<Status>>>);

impl StatusSink for StatusLog {
    fn update(&mut self, status: &Status) {
        self.0.borrow_mut().push(status.clone());
    }
}

impl StatusLog {
    fn last(&self) -> Status {
        self.0.borrow().last().cloned().unwrap()
    }
}

#[derive(Clone, Default)]
struct SpeechLog(Rc<RefCell<Vec<String>>>);

impl Speaker for SpeechLog {
    fn speak(&mut self, text: &str) {
        self.0.borrow_mut().push(text.to_string());
    }

    fn cancel(&mut self) {}
}

#[derive(Default)]
struct BackendLog {
    requests: Vec<StreamRequest>,
    stops: usize,
}

/// Backend whose behaviour is scripted per request kind.
struct ScriptedBackend {
    log: Rc<RefCell<BackendLog>>,
    fail_exact: bool,
    fail_relaxed: bool,
}

impl ScriptedBackend {
    fn working(log: Rc<RefCell<BackendLog>>) -> Self {
        Self {
            log,
            fail_exact: false,
            fail_relaxed: false,
        }
    }
}

impl CameraBackend for ScriptedBackend {
    fn open(&mut self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        self.log.borrow_mut().requests.push(*request);
        let fail = if request.exact {
            self.fail_exact
        } else {
            self.fail_relaxed
        };
        if fail {
            return Err(CameraError::PermissionDenied);
        }
        Ok(Box::new(ScriptedStream {
            log: Rc::clone(&self.log),
            granted: request.exact.then_some(request.facing),
            stopped: false,
        }))
    }
}

struct ScriptedStream {
    log: Rc<RefCell<BackendLog>>,
    granted: Option<CameraFacing>,
    stopped: bool,
}

impl CameraStream for ScriptedStream {
    fn granted_facing(&self) -> Option<CameraFacing> {
        self.granted
    }

    fn latest_frame(&self) -> Option<Frame> {
        (!self.stopped).then(|| Frame::new(vec![90; 320 * 240 * 3], 320, 240))
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.log.borrow_mut().stops += 1;
        }
    }
}

fn build_loop(
    backend: Box<dyn CameraBackend>,
    endpoint: String,
) -> (DetectionLoop, StatusLog, SpeechLog) {
    let statuses = StatusLog::default();
    let speech = SpeechLog::default();
    let client = DetectionClient::new(endpoint).unwrap();
    let detection_loop =
        DetectionLoop::new(CaptureSource::new(backend), client, Box::new(statuses.clone()))
            .with_notifier(NotificationPolicy::new(Some(Box::new(speech.clone()))));
    (detection_loop, statuses, speech)
}

async fn mock_guidance(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/detect"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// === Tick tests ===

#[tokio::test]
async fn test_same_guidance_is_spoken_once() {
    let server = MockServer::start().await;
    mock_guidance(
        &server,
        serde_json::json!({"guidance": "Chair ahead", "actionable_guidance": "Turn left"}),
    )
    .await;

    let (mut lp, statuses, speech) = build_loop(
        Box::new(TestPatternBackend),
        format!("{}/detect", server.uri()),
    );
    lp.start_camera(CameraFacing::Environment).unwrap();
    lp.start().unwrap();

    assert_eq!(lp.tick().await, TickOutcome::Delivered(NotifyOutcome::Emitted));
    assert_eq!(lp.tick().await, TickOutcome::Delivered(NotifyOutcome::Suppressed));
    assert_eq!(lp.tick().await, TickOutcome::Delivered(NotifyOutcome::Suppressed));

    assert_eq!(*speech.0.borrow(), vec!["Turn left".to_string()]);
    assert_eq!(lp.last_spoken(), "Turn left");
    assert_eq!(statuses.last(), Status::live("Chair ahead"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_empty_guidance_shows_no_objects() {
    let server = MockServer::start().await;
    mock_guidance(&server, serde_json::json!({"guidance": ""})).await;

    let (mut lp, statuses, speech) = build_loop(
        Box::new(TestPatternBackend),
        format!("{}/detect", server.uri()),
    );
    lp.start_camera(CameraFacing::Environment).unwrap();
    lp.start().unwrap();

    assert_eq!(lp.tick().await, TickOutcome::Delivered(NotifyOutcome::Suppressed));
    assert_eq!(statuses.last(), Status::live("No objects detected."));
    assert!(speech.0.borrow().is_empty());
    assert!(lp.is_detecting());
}

#[tokio::test]
async fn test_server_error_stops_detection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (mut lp, statuses, _) = build_loop(
        Box::new(TestPatternBackend),
        format!("{}/detect", server.uri()),
    );
    lp.start_camera(CameraFacing::Environment).unwrap();
    lp.start().unwrap();

    assert_eq!(lp.tick().await, TickOutcome::Failed);
    assert_eq!(lp.state(), LoopState::Idle);
    assert_eq!(statuses.last(), Status::error(STATUS_CONNECTION_ERROR));

    // No further requests once stopped
    assert!(matches!(lp.tick().await, TickOutcome::Skipped(_)));
}

#[tokio::test]
async fn test_application_error_stops_detection() {
    let server = MockServer::start().await;
    mock_guidance(&server, serde_json::json!({"error": "model not loaded"})).await;

    let (mut lp, statuses, speech) = build_loop(
        Box::new(TestPatternBackend),
        format!("{}/detect", server.uri()),
    );
    lp.start_camera(CameraFacing::Environment).unwrap();
    lp.start().unwrap();

    assert_eq!(lp.tick().await, TickOutcome::Failed);
    assert!(!lp.is_detecting());
    assert!(statuses.last().is_error());
    assert!(speech.0.borrow().is_empty());
}

#[tokio::test]
async fn test_unreachable_endpoint_stops_detection() {
    let (mut lp, statuses, _) = build_loop(
        Box::new(TestPatternBackend),
        "http://127.0.0.1:9/detect".to_string(),
    );
    lp.start_camera(CameraFacing::Environment).unwrap();
    lp.start().unwrap();

    assert_eq!(lp.tick().await, TickOutcome::Failed);
    assert_eq!(statuses.last(), Status::error(STATUS_CONNECTION_ERROR));
}

// === Camera tests ===

#[test]
fn test_switch_camera_while_detecting() {
    let log = Rc::new(RefCell::new(BackendLog::default()));
    let (mut lp, _, _) = build_loop(
        Box::new(ScriptedBackend::working(Rc::clone(&log))),
        "http://127.0.0.1:9/detect".to_string(),
    );

    lp.start_camera(CameraFacing::Environment).unwrap();
    lp.start().unwrap();
    lp.switch_camera(CameraFacing::User).unwrap();

    let log = log.borrow();
    assert_eq!(log.stops, 1, "old session must be released");
    assert_eq!(log.requests.len(), 2);
    assert_eq!(log.requests[1].facing, CameraFacing::User);
    assert!(log.requests[1].exact);

    assert_eq!(lp.state(), LoopState::Idle);
    let session = lp.camera().session().unwrap();
    assert_eq!(session.requested_facing(), CameraFacing::User);
    assert!(session.mirrored());
}

#[test]
fn test_exact_failure_falls_back_to_relaxed() {
    let log = Rc::new(RefCell::new(BackendLog::default()));
    let backend = ScriptedBackend {
        log: Rc::clone(&log),
        fail_exact: true,
        fail_relaxed: false,
    };
    let (mut lp, _, _) = build_loop(Box::new(backend), "http://127.0.0.1:9/detect".to_string());

    lp.start_camera(CameraFacing::User).unwrap();

    let log = log.borrow();
    let requests = &log.requests;
    assert_eq!(requests.len(), 2);
    assert!(requests[0].exact);
    assert!(!requests[1].exact);
    assert_eq!(requests[1].facing, CameraFacing::User);

    // The device never confirmed a user-facing camera
    assert!(!lp.camera().session().unwrap().mirrored());
}

#[test]
fn test_acquisition_failure_blocks_start() {
    let log = Rc::new(RefCell::new(BackendLog::default()));
    let backend = ScriptedBackend {
        log: Rc::clone(&log),
        fail_exact: true,
        fail_relaxed: true,
    };
    let (mut lp, statuses, _) =
        build_loop(Box::new(backend), "http://127.0.0.1:9/detect".to_string());

    assert!(matches!(
        lp.start_camera(CameraFacing::Environment),
        Err(LoopError::Camera(CameraError::PermissionDenied))
    ));
    assert!(!lp.camera().is_live());
    assert_eq!(statuses.last(), Status::error(STATUS_CAMERA_FAILED));

    assert!(matches!(lp.start(), Err(LoopError::NoSession)));
    assert_eq!(lp.state(), LoopState::Idle);
}

// === Run loop tests ===

/// Number of requests the mock server has seen so far.
async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

#[tokio::test]
async fn test_run_delivers_guidance_until_quit() {
    let server = MockServer::start().await;
    mock_guidance(
        &server,
        serde_json::json!({"guidance": "Door ahead", "actionable_guidance": "Turn left"}),
    )
    .await;

    let log = Rc::new(RefCell::new(BackendLog::default()));
    let (lp, _, speech) = build_loop(
        Box::new(ScriptedBackend::working(log)),
        format!("{}/detect", server.uri()),
    );
    let mut lp = lp.with_tick_period(Duration::from_millis(50));

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(UserAction::GetStarted).unwrap();
    tx.send(UserAction::Start).unwrap();

    // Quit once the first guidance has been spoken
    let spoken = speech.clone();
    let quit_after_speech = async move {
        let _ = tokio::time::timeout(Duration::from_secs(10), async {
            while spoken.0.borrow().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        tx.send(UserAction::Quit).unwrap();
    };

    tokio::join!(lp.run(rx), quit_after_speech);

    assert!(request_count(&server).await >= 1);
    assert_eq!(lp.last_spoken(), "Turn left");
    assert_eq!(*speech.0.borrow(), vec!["Turn left".to_string()]);
    assert!(!lp.is_detecting());
    assert!(!lp.camera().is_live());
}

#[tokio::test]
async fn test_run_drops_ticks_while_request_in_flight() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/detect"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"guidance": "Chair"}))
                .set_delay(Duration::from_secs(1)),
        )
        .mount(&server)
        .await;

    let log = Rc::new(RefCell::new(BackendLog::default()));
    let (lp, _, _) = build_loop(
        Box::new(ScriptedBackend::working(log)),
        format!("{}/detect", server.uri()),
    );
    let mut lp = lp.with_tick_period(Duration::from_millis(50));

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(UserAction::GetStarted).unwrap();
    tx.send(UserAction::Start).unwrap();

    // Let several ticks pass while the first request is still unanswered
    let server_ref = &server;
    let quit_while_in_flight = async move {
        let _ = tokio::time::timeout(Duration::from_secs(10), async {
            while request_count(server_ref).await == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(UserAction::Quit).unwrap();
    };

    tokio::join!(lp.run(rx), quit_while_in_flight);

    assert_eq!(request_count(&server).await, 1);
    assert_eq!(lp.last_spoken(), "");
}

#[tokio::test]
async fn test_run_ends_when_channel_closes() {
    let (mut lp, _, _) = build_loop(
        Box::new(TestPatternBackend),
        "http://127.0.0.1:9/detect".to_string(),
    );

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(UserAction::GetStarted).unwrap();
    drop(tx);

    lp.run(rx).await;
    assert!(!lp.camera().is_live());
}
