//! Error types for the capture engine.
//!
//! None of these are fatal to the host: camera and model failures resolve to a
//! visible status, and the rest signal a caller asking for something the
//! current state does not allow.

use crate::core_modules::status::StableStatus;
use thiserror::Error;

pub use crate::core_modules::face::DetectionError;
pub use crate::core_modules::frame::FrameError;

/// Failures while opening or running the camera stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera access was denied")]
    PermissionDenied,

    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Failures of the capture-and-encode pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture refused while status is {status}")]
    NotAcceptable { status: StableStatus },

    #[error("cannot capture an empty frame")]
    EmptyFrame,

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Actions a host can ask of a capture session, used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    AcknowledgeInstructions,
    Capture,
    Retake,
    Confirm,
}

/// Errors returned by the capture session state machine.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{action:?} is not allowed in the {state} state")]
    InvalidTransition {
        state: crate::session::ScreenState,
        action: SessionAction,
    },

    #[error("the session has already been handed back to the host")]
    Terminated,

    #[error("no frame is available from the camera")]
    NoFrame,

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

pub type SessionResult<T> = Result<T, SessionError>;
