// THEORY:
// The camera is a host-platform capability, so the engine only sees it through
// two traits. A `CameraDevice` opens a stream for a set of constraints (or
// refuses, e.g. when permission is denied). A `MediaStream` is the opened stream
// bound to its video sink: it reports how ready the sink is, hands out the
// current frame, and stops its tracks.
//
// Streams are shared behind `Arc` because the detection loop reads frames from
// the same stream the media session owns. Only the media session ever calls
// `stop_tracks`.

use crate::core_modules::frame::Frame;
use crate::error::CameraError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which way the requested camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Front camera, facing the user.
    User,
    /// Rear camera.
    Environment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConstraints {
    pub facing: FacingMode,
    /// Target (ideal) resolution; the device may deliver something else.
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            width: 1280,
            height: 720,
        }
    }
}

/// How much data the video sink holds, mirroring media element ready states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Only a sink with enough data yields frames worth classifying.
    pub fn can_analyze(&self) -> bool {
        *self == ReadyState::HaveEnoughData
    }
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Requests a stream. Permission prompts happen inside this call.
    async fn open(&self, constraints: &CameraConstraints) -> Result<Arc<dyn MediaStream>, CameraError>;
}

#[async_trait]
pub trait MediaStream: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    /// The frame currently shown by the sink, if any.
    fn current_frame(&self) -> Option<Frame>;

    /// Resolves once the sink has started playing the stream.
    async fn playable(&self) -> Result<(), CameraError>;

    /// Stops every track of the stream. Safe to call more than once.
    fn stop_tracks(&self);

    /// Whether any track is still running.
    fn is_live(&self) -> bool;
}
