// THEORY:
// This file is the entry point for the `selfie_vision` library crate, the engine
// behind a live selfie capture screen.
//
// The public face of the crate is the `CaptureSession`: a host screen mounts one,
// drives it with the user's actions (acknowledge, capture, retake, confirm,
// cancel) and receives the finished photo through `CaptureHost::on_capture`.
// Everything underneath is layered bottom-up:
//
// - `core_modules`: pure, camera-free pieces (frame/pixel primitives, the
//   quality analyzer, the debounce filter, the capture pipeline, retake policy).
// - `status_feed` and `detection_loop`: the periodic classify-and-debounce cycle.
// - `media_session`: sole owner of the camera stream and the detection timer.
// - `session`: the user-visible state machine on top.
//
// The camera itself is host-provided through the traits in `camera`.

pub mod camera;
pub mod core_modules;
pub mod detection_loop;
pub mod error;
pub mod media_session;
pub mod session;
pub mod status_feed;

pub use camera::{CameraConstraints, CameraDevice, FacingMode, MediaStream, ReadyState};
pub use core_modules::analyzer::{AnalyzerConfig, FrameQualityAnalyzer, FrameReport};
pub use core_modules::capture::{CaptureConfig, CapturePipeline, CapturedImage};
pub use core_modules::face::{DetectorHandle, FaceBox, FaceDetector, ModelState, shared_detector};
pub use core_modules::frame::Frame;
pub use core_modules::retake::RetakeDecision;
pub use core_modules::skin_detector::SkinRegionDetector;
pub use core_modules::status::{FrameClassification, StableStatus};
pub use error::{CameraError, CaptureError, DetectionError, SessionError};
pub use media_session::CancelHandle;
pub use session::{CaptureHost, CaptureSession, FrameShape, HostConfig, ScreenState, SessionConfig, Termination};
pub use status_feed::{StatusFeed, StatusPulse};
