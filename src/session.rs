// THEORY:
// `CaptureSession` is the ownership root of one selfie capture. It composes the
// media session, the status feed, the capture pipeline and the retake policy
// into the flow the user sees:
//
//     instructions -> camera -> preview -> uploading
//                       ^          |
//                       +- retake -+
//
// Every transition into `camera` acquires the stream and every transition out
// of it releases the stream, whatever the path (capture, cancel, drop). The
// session never touches the stream or the timer directly; it only asks the
// media session to `acquire` or `release`.
//
// The host hears back through exactly two callbacks. `on_capture` fires once,
// on `preview -> uploading`, after which the session is inert. `on_cancel` fires
// for every cancel issued before that point, and the stream is already stopped
// by the time it runs.

use crate::camera::{CameraConstraints, CameraDevice};
use crate::core_modules::analyzer::{AnalyzerConfig, FrameQualityAnalyzer};
use crate::core_modules::capture::{CaptureConfig, CapturePipeline, CapturedImage};
use crate::core_modules::debounce::DEFAULT_DEBOUNCE_COUNT;
use crate::core_modules::face::DetectorHandle;
use crate::core_modules::retake::{DEFAULT_MAX_RETAKES, RetakeDecision, RetakePolicy};
use crate::core_modules::status::StableStatus;
use crate::detection_loop::DEFAULT_DETECTION_INTERVAL;
use crate::error::{CaptureError, SessionAction, SessionError, SessionResult};
use crate::media_session::{AcquireOutcome, CancelHandle, MediaSession};
use crate::status_feed::{StatusFeed, StatusPulse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Outline drawn over the live preview. Purely presentational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameShape {
    #[default]
    Circle,
    Square,
}

/// What the host screen passes in when it mounts the capture UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub shape: FrameShape,
    /// Show the instructions screen first. When `false` the session opens
    /// straight into the camera.
    pub instructions: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            shape: FrameShape::Circle,
            instructions: true,
        }
    }
}

/// Every tunable of a capture session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: HostConfig,
    pub analyzer: AnalyzerConfig,
    pub capture: CaptureConfig,
    pub camera: CameraConstraints,
    pub detection_interval: Duration,
    /// Consecutive identical classifications needed to change the status.
    pub debounce_count: u32,
    pub max_retakes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            analyzer: AnalyzerConfig::default(),
            capture: CaptureConfig::default(),
            camera: CameraConstraints::default(),
            detection_interval: DEFAULT_DETECTION_INTERVAL,
            debounce_count: DEFAULT_DEBOUNCE_COUNT,
            max_retakes: DEFAULT_MAX_RETAKES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenState {
    Instructions,
    Camera,
    Preview,
    Uploading,
}

impl ScreenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenState::Instructions => "instructions",
            ScreenState::Camera => "camera",
            ScreenState::Preview => "preview",
            ScreenState::Uploading => "uploading",
        }
    }
}

impl fmt::Display for ScreenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the session was handed back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Captured,
    Cancelled,
}

/// The host screen's side of the boundary.
pub trait CaptureHost: Send {
    /// The confirmed selfie. Called at most once per session.
    fn on_capture(&mut self, image: CapturedImage);

    /// The user backed out. The camera is already released.
    fn on_cancel(&mut self);
}

pub struct CaptureSession {
    host_config: HostConfig,
    state: ScreenState,
    termination: Option<Termination>,
    media: MediaSession,
    status: StatusFeed,
    pipeline: CapturePipeline,
    retakes: RetakePolicy,
    captured: Option<CapturedImage>,
    host: Box<dyn CaptureHost>,
    cancel: CancelHandle,
}

impl CaptureSession {
    /// Builds a session without touching the camera. Call `start` (or use
    /// `mount`) to enter the initial screen.
    pub fn new(
        config: SessionConfig,
        camera: Arc<dyn CameraDevice>,
        detector: DetectorHandle,
        host: Box<dyn CaptureHost>,
    ) -> Self {
        let status = StatusFeed::new(config.debounce_count);
        let cancel = CancelHandle::new();
        let media = MediaSession::new(
            camera,
            config.camera,
            Arc::new(FrameQualityAnalyzer::new(config.analyzer)),
            detector,
            status.clone(),
            config.detection_interval,
            cancel.clone(),
        );
        let state = if config.host.instructions {
            ScreenState::Instructions
        } else {
            ScreenState::Camera
        };

        Self {
            host_config: config.host,
            state,
            termination: None,
            media,
            status,
            pipeline: CapturePipeline::new(config.capture),
            retakes: RetakePolicy::new(config.max_retakes),
            captured: None,
            host,
            cancel,
        }
    }

    /// `new` followed by `start`.
    pub async fn mount(
        config: SessionConfig,
        camera: Arc<dyn CameraDevice>,
        detector: DetectorHandle,
        host: Box<dyn CaptureHost>,
    ) -> Self {
        let mut session = Self::new(config, camera, detector, host);
        if let Err(err) = session.start().await {
            info!(error = %err, "session ended while mounting");
        }
        session
    }

    /// Enters the initial screen. With instructions disabled this acquires
    /// the camera. Does nothing while a stream is already held.
    pub async fn start(&mut self) -> SessionResult<()> {
        self.ensure_active()?;
        info!(state = %self.state, shape = ?self.host_config.shape, "capture session mounted");
        if self.state == ScreenState::Camera && !self.media.is_held() {
            self.enter_camera().await?;
        }
        Ok(())
    }

    /// `instructions -> camera`.
    pub async fn acknowledge_instructions(&mut self) -> SessionResult<()> {
        self.ensure_active()?;
        self.require(ScreenState::Instructions, SessionAction::AcknowledgeInstructions)?;
        self.enter_camera().await
    }

    /// `camera -> preview`, stamped with the current time.
    pub fn capture(&mut self) -> SessionResult<&CapturedImage> {
        self.capture_at(Utc::now())
    }

    /// `camera -> preview`. Refused unless the stable status is `acceptable`.
    pub fn capture_at(&mut self, captured_at: DateTime<Utc>) -> SessionResult<&CapturedImage> {
        self.ensure_active()?;
        self.require(ScreenState::Camera, SessionAction::Capture)?;

        let status = self.status.current();
        let frame = match self.media.snapshot() {
            Some(frame) => frame,
            None if status.allows_capture() => return Err(SessionError::NoFrame),
            None => return Err(CaptureError::NotAcceptable { status }.into()),
        };
        let image = self.pipeline.capture(&frame, status, captured_at)?;

        self.media.release();
        self.transition(ScreenState::Preview);
        Ok(self.captured.insert(image))
    }

    /// Rejects the preview. Goes back to the camera while retakes remain;
    /// otherwise stays on the (now final) preview.
    pub async fn retake(&mut self) -> SessionResult<RetakeDecision> {
        self.ensure_active()?;
        self.require(ScreenState::Preview, SessionAction::Retake)?;

        let decision = self.retakes.reject();
        match decision {
            RetakeDecision::Retake { attempt } => {
                info!(attempt, max = self.retakes.max_retakes(), "retaking photo");
                self.captured = None;
                self.enter_camera().await?;
            }
            RetakeDecision::Exhausted => {
                info!(retakes = self.retakes.retake_count(), "no retakes left; photo is final");
            }
        }
        Ok(decision)
    }

    /// `preview -> uploading`. Hands the photo to the host; the session is
    /// finished afterwards.
    pub fn confirm(&mut self) -> SessionResult<()> {
        self.ensure_active()?;
        self.require(ScreenState::Preview, SessionAction::Confirm)?;
        let image = self.captured.clone().ok_or(SessionError::NoFrame)?;

        self.media.release();
        self.transition(ScreenState::Uploading);
        self.termination = Some(Termination::Captured);
        self.host.on_capture(image);
        Ok(())
    }

    /// Backs out of the flow from any screen before `uploading`. The stream
    /// is stopped before this returns and before `on_cancel` runs.
    pub fn cancel(&mut self) -> SessionResult<()> {
        if self.termination == Some(Termination::Captured) {
            return Err(SessionError::Terminated);
        }
        self.finish_cancel();
        Ok(())
    }

    async fn enter_camera(&mut self) -> SessionResult<()> {
        self.transition(ScreenState::Camera);
        match self.media.acquire().await {
            AcquireOutcome::Live => Ok(()),
            AcquireOutcome::Unavailable(err) => {
                // The status now reads `no_camera`; the user leaves via cancel.
                warn!(error = %err, "camera unavailable; waiting for cancel");
                Ok(())
            }
            AcquireOutcome::Interrupted => {
                self.finish_cancel();
                Err(SessionError::Terminated)
            }
        }
    }

    fn finish_cancel(&mut self) {
        self.cancel.cancel();
        self.media.release();
        self.termination = Some(Termination::Cancelled);
        info!(state = %self.state, "capture session cancelled");
        self.host.on_cancel();
    }

    /// Picks up a cancel fired through the handle while no call was running,
    /// and refuses everything once the session is finished.
    fn ensure_active(&mut self) -> SessionResult<()> {
        if self.termination.is_none() && self.cancel.is_cancelled() {
            self.finish_cancel();
        }
        match self.termination {
            Some(_) => Err(SessionError::Terminated),
            None => Ok(()),
        }
    }

    fn require(&self, state: ScreenState, action: SessionAction) -> SessionResult<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }

    fn transition(&mut self, next: ScreenState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "screen state changed");
        }
        self.state = next;
    }

    pub fn screen_state(&self) -> ScreenState {
        self.state
    }

    pub fn status(&self) -> StableStatus {
        self.status.current()
    }

    pub fn feedback(&self) -> &'static str {
        self.status.current().feedback()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StableStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_pulses(&self) -> broadcast::Receiver<StatusPulse> {
        self.status.subscribe_pulses()
    }

    pub fn retake_count(&self) -> u32 {
        self.retakes.retake_count()
    }

    pub fn retakes_remaining(&self) -> u32 {
        self.retakes.remaining()
    }

    /// Whether the preview currently offers a retake.
    pub fn retake_offered(&self) -> bool {
        self.state == ScreenState::Preview && self.termination.is_none() && self.retakes.can_retake()
    }

    /// Whether the preview on screen can no longer be replaced. A cancelled
    /// session shows no preview at all.
    pub fn is_final(&self) -> bool {
        self.state == ScreenState::Preview && self.termination.is_none() && !self.retakes.can_retake()
    }

    /// Whether the capture control is enabled.
    pub fn can_capture(&self) -> bool {
        self.termination.is_none()
            && self.state == ScreenState::Camera
            && self.media.is_held()
            && self.status.current().allows_capture()
    }

    pub fn captured_image(&self) -> Option<&CapturedImage> {
        self.captured.as_ref()
    }

    pub fn is_stream_held(&self) -> bool {
        self.media.is_held()
    }

    pub fn is_detection_running(&self) -> bool {
        self.media.is_detection_running()
    }

    pub fn shape(&self) -> FrameShape {
        self.host_config.shape
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{MediaStream, ReadyState};
    use crate::core_modules::face::{FaceBox, FixedDetector};
    use crate::core_modules::frame::Frame;
    use crate::core_modules::pixel::pixel::Pixel;
    use crate::error::CameraError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Stream {
        stops: AtomicUsize,
    }

    #[async_trait]
    impl MediaStream for Stream {
        fn ready_state(&self) -> ReadyState {
            ReadyState::HaveEnoughData
        }
        fn current_frame(&self) -> Option<Frame> {
            Some(Frame::solid(400, 300, Pixel::new(190, 160, 140, 255), 0))
        }
        async fn playable(&self) -> Result<(), CameraError> {
            Ok(())
        }
        fn stop_tracks(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
        fn is_live(&self) -> bool {
            true
        }
    }

    struct Camera {
        stream: Arc<Stream>,
        opens: AtomicUsize,
    }

    #[async_trait]
    impl CameraDevice for Camera {
        async fn open(&self, _constraints: &CameraConstraints) -> Result<Arc<dyn MediaStream>, CameraError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(self.stream.clone())
        }
    }

    #[derive(Default)]
    struct Calls {
        captures: Vec<CapturedImage>,
        cancels: usize,
    }

    struct Host(Arc<Mutex<Calls>>);

    impl CaptureHost for Host {
        fn on_capture(&mut self, image: CapturedImage) {
            self.0.lock().unwrap().captures.push(image);
        }
        fn on_cancel(&mut self) {
            self.0.lock().unwrap().cancels += 1;
        }
    }

    fn session(instructions: bool) -> (CaptureSession, Arc<Camera>, Arc<Mutex<Calls>>) {
        let camera = Arc::new(Camera {
            stream: Arc::new(Stream::default()),
            opens: AtomicUsize::new(0),
        });
        let calls = Arc::new(Mutex::new(Calls::default()));
        let config = SessionConfig {
            host: HostConfig {
                shape: FrameShape::Square,
                instructions,
            },
            ..SessionConfig::default()
        };
        let detector = DetectorHandle::ready(Arc::new(FixedDetector::new(vec![FaceBox::new(
            140.0, 90.0, 120.0, 120.0,
        )])));
        let session = CaptureSession::new(config, camera.clone(), detector, Box::new(Host(calls.clone())));
        (session, camera, calls)
    }

    #[test]
    fn host_config_reads_json_with_defaults() {
        let config: HostConfig = serde_json::from_str(r#"{"shape":"square"}"#).unwrap();
        assert_eq!(config.shape, FrameShape::Square);
        assert!(config.instructions);

        let config: HostConfig = serde_json::from_str(r#"{"instructions":false}"#).unwrap();
        assert_eq!(config.shape, FrameShape::Circle);
        assert!(!config.instructions);
    }

    #[tokio::test(start_paused = true)]
    async fn instructions_gate_the_camera() {
        let (mut session, camera, _calls) = session(true);
        session.start().await.unwrap();
        assert_eq!(session.screen_state(), ScreenState::Instructions);
        assert_eq!(session.shape(), FrameShape::Square);
        assert_eq!(camera.opens.load(Ordering::SeqCst), 0);

        assert!(matches!(
            session.capture(),
            Err(SessionError::InvalidTransition {
                state: ScreenState::Instructions,
                action: SessionAction::Capture
            })
        ));

        session.acknowledge_instructions().await.unwrap();
        assert_eq!(session.screen_state(), ScreenState::Camera);
        assert!(session.is_stream_held());
        assert!(session.is_detection_running());
        assert!(session.acknowledge_instructions().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn capture_waits_for_acceptable_status() {
        let (mut session, camera, _calls) = session(false);
        session.start().await.unwrap();
        assert_eq!(camera.opens.load(Ordering::SeqCst), 1);

        assert!(!session.can_capture());
        assert!(matches!(
            session.capture(),
            Err(SessionError::Capture(CaptureError::NotAcceptable {
                status: StableStatus::Loading
            }))
        ));
        assert_eq!(session.screen_state(), ScreenState::Camera);

        tokio::time::sleep(Duration::from_millis(460)).await;
        assert!(session.can_capture());

        let image = session.capture().unwrap();
        assert_eq!((image.width, image.height), (600, 600));
        assert_eq!(session.screen_state(), ScreenState::Preview);
        assert!(!session.is_stream_held());
        assert!(!session.is_detection_running());
        assert_eq!(camera.stream.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_hands_off_once_and_goes_quiet() {
        let (mut session, _camera, calls) = session(false);
        session.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(460)).await;
        session.capture().unwrap();

        session.confirm().unwrap();
        assert_eq!(session.screen_state(), ScreenState::Uploading);
        assert_eq!(session.termination(), Some(Termination::Captured));

        assert!(matches!(session.confirm(), Err(SessionError::Terminated)));
        assert!(matches!(session.cancel(), Err(SessionError::Terminated)));
        assert!(matches!(session.retake().await, Err(SessionError::Terminated)));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.captures.len(), 1);
        assert!(calls.captures[0].data_uri.starts_with("data:image/jpeg;base64,"));
        assert_eq!(calls.cancels, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_from_final_preview_clears_it() {
        let camera = Arc::new(Camera {
            stream: Arc::new(Stream::default()),
            opens: AtomicUsize::new(0),
        });
        let calls = Arc::new(Mutex::new(Calls::default()));
        let config = SessionConfig {
            host: HostConfig {
                shape: FrameShape::Square,
                instructions: false,
            },
            max_retakes: 1,
            ..SessionConfig::default()
        };
        let detector = DetectorHandle::ready(Arc::new(FixedDetector::new(vec![FaceBox::new(
            140.0, 90.0, 120.0, 120.0,
        )])));
        let mut session = CaptureSession::new(config, camera, detector, Box::new(Host(calls.clone())));
        session.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(460)).await;
        session.capture().unwrap();
        assert!(session.is_final());
        assert!(!session.retake_offered());

        session.cancel().unwrap();
        assert_eq!(session.termination(), Some(Termination::Cancelled));
        assert!(!session.is_final());
        assert!(!session.retake_offered());
        assert_eq!(calls.lock().unwrap().cancels, 1);
    }

    #[tokio::test]
    async fn cancel_from_instructions_needs_no_camera() {
        let (mut session, camera, calls) = session(true);
        session.start().await.unwrap();
        session.cancel().unwrap();

        assert_eq!(session.termination(), Some(Termination::Cancelled));
        assert_eq!(camera.opens.load(Ordering::SeqCst), 0);
        assert_eq!(calls.lock().unwrap().cancels, 1);
        assert!(matches!(
            session.acknowledge_instructions().await,
            Err(SessionError::Terminated)
        ));
    }

    #[tokio::test]
    async fn handle_cancel_is_picked_up_on_next_call() {
        let (mut session, camera, calls) = session(false);
        session.start().await.unwrap();
        assert!(session.is_stream_held());

        session.cancel_handle().cancel();
        assert!(matches!(session.capture(), Err(SessionError::Terminated)));
        assert!(!session.is_stream_held());
        assert_eq!(camera.stream.stops.load(Ordering::SeqCst), 1);
        assert_eq!(calls.lock().unwrap().cancels, 1);
    }
}
