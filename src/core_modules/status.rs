// THEORY:
// Two vocabularies describe what the camera sees. A `FrameClassification` is the
// raw, per-frame verdict of the analyzer and is noisy by nature: a blink or a
// blurred frame can flip it for a single tick. A `StableStatus` is the debounced
// counterpart the rest of the system reads; it only changes once the same
// classification has been seen for several consecutive frames. The extra
// `Loading` value covers the window before the first verdict arrives.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The analyzer's verdict for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameClassification {
    /// Camera access was refused or no device is available.
    NoCamera,
    /// No face was found in the frame.
    NoFace,
    /// The frame is too dark for face geometry to be trusted.
    TooDark,
    /// More than one face is visible.
    MultipleFaces,
    /// The face occupies too little of the frame.
    TooFar,
    /// The face center lies outside the tolerance band.
    NotCentered,
    /// The frame is good enough to capture.
    Acceptable,
}

/// The debounced status shown to the user and used to gate capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StableStatus {
    /// No classification has been settled yet.
    #[default]
    Loading,
    NoCamera,
    NoFace,
    TooDark,
    MultipleFaces,
    TooFar,
    NotCentered,
    Acceptable,
}

impl StableStatus {
    pub fn allows_capture(&self) -> bool {
        matches!(self, StableStatus::Acceptable)
    }

    /// Short guidance text for the status line under the camera preview.
    pub fn feedback(&self) -> &'static str {
        match self {
            StableStatus::Loading => "Starting camera...",
            StableStatus::NoCamera => "Camera unavailable. Allow camera access to continue.",
            StableStatus::NoFace => "No face detected. Look at the camera.",
            StableStatus::TooDark => "Too dark. Move to a brighter spot.",
            StableStatus::MultipleFaces => "Only one person should be in the frame.",
            StableStatus::TooFar => "Move closer to the camera.",
            StableStatus::NotCentered => "Center your face in the frame.",
            StableStatus::Acceptable => "Looks good! Hold still and take the photo.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StableStatus::Loading => "loading",
            StableStatus::NoCamera => "no_camera",
            StableStatus::NoFace => "no_face",
            StableStatus::TooDark => "too_dark",
            StableStatus::MultipleFaces => "multiple_faces",
            StableStatus::TooFar => "too_far",
            StableStatus::NotCentered => "not_centered",
            StableStatus::Acceptable => "acceptable",
        }
    }
}

impl From<FrameClassification> for StableStatus {
    fn from(classification: FrameClassification) -> Self {
        match classification {
            FrameClassification::NoCamera => StableStatus::NoCamera,
            FrameClassification::NoFace => StableStatus::NoFace,
            FrameClassification::TooDark => StableStatus::TooDark,
            FrameClassification::MultipleFaces => StableStatus::MultipleFaces,
            FrameClassification::TooFar => StableStatus::TooFar,
            FrameClassification::NotCentered => StableStatus::NotCentered,
            FrameClassification::Acceptable => StableStatus::Acceptable,
        }
    }
}

impl fmt::Display for StableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FrameClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&StableStatus::from(*self), f)
    }
}
