// THEORY:
// Face detection is an external capability the analyzer consults, not something
// it owns. Detectors plug in through the `FaceDetector` trait; how they get
// loaded is modelled explicitly as a `ModelState` (`Loading`, `Ready`, `Failed`)
// published on a watch channel, so every consumer sees the same answer and
// nobody checks an ad-hoc boolean.
//
// Loading is a one-time, process-wide asynchronous initialization. Failure is
// not fatal: the analyzer falls back to a permissive verdict so capture stays
// possible (with reduced safety) instead of blocking the user.

use crate::core_modules::frame::Frame;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

/// Axis-aligned face bounding box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
}

impl FaceBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectionError {
    #[error("face detection model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("face detection failed: {0}")]
    Inference(String),
}

impl DetectionError {
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }
}

/// Pluggable face detection backend.
pub trait FaceDetector: Send + Sync {
    /// Runs one inference over the frame and returns every face found.
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceBox>, DetectionError>;
}

/// Load state of the face detection model.
#[derive(Clone)]
pub enum ModelState {
    Loading,
    Ready(Arc<dyn FaceDetector>),
    Failed(String),
}

impl ModelState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ModelState::Loading)
    }
}

impl std::fmt::Debug for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelState::Loading => f.write_str("Loading"),
            ModelState::Ready(_) => f.write_str("Ready"),
            ModelState::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

/// Shared, observable handle on the detector's load state.
#[derive(Clone)]
pub struct DetectorHandle {
    state_tx: Arc<watch::Sender<ModelState>>,
}

impl DetectorHandle {
    fn with_state(state: ModelState) -> Self {
        let (state_tx, _) = watch::channel(state);
        Self {
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn loading() -> Self {
        Self::with_state(ModelState::Loading)
    }

    pub fn ready(detector: Arc<dyn FaceDetector>) -> Self {
        Self::with_state(ModelState::Ready(detector))
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::with_state(ModelState::Failed(reason.into()))
    }

    /// Starts loading in the background and returns immediately in `Loading`.
    /// Must be called from within a tokio runtime.
    pub fn spawn_load<F>(loader: F) -> Self
    where
        F: Future<Output = Result<Arc<dyn FaceDetector>, DetectionError>> + Send + 'static,
    {
        let handle = Self::loading();
        // Built outside the task so an unpolled task dropped at shutdown still settles.
        let guard = LoadGuard(handle.clone());
        tokio::spawn(async move {
            let result = loader.await;
            guard.0.resolve(result);
        });
        handle
    }

    /// Publishes the outcome of a load. Only the first resolution sticks.
    pub fn resolve(&self, result: Result<Arc<dyn FaceDetector>, DetectionError>) {
        let next = match result {
            Ok(detector) => {
                info!("face detection model ready");
                ModelState::Ready(detector)
            }
            Err(err) => {
                warn!(error = %err, "face detection model failed to load; falling back to permissive capture");
                ModelState::Failed(err.to_string())
            }
        };
        self.state_tx.send_if_modified(|state| {
            if state.is_loading() {
                *state = next;
                true
            } else {
                false
            }
        });
    }

    pub fn state(&self) -> ModelState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ModelState> {
        self.state_tx.subscribe()
    }

    /// Waits until the model is no longer `Loading` and returns the settled state.
    pub async fn wait_settled(&self) -> ModelState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            // The sender lives inside `self`, so the channel cannot close here.
            Err(_) => self.state(),
        }
    }
}

/// Settles a still-loading handle as `Failed` when the load task unwinds or
/// is dropped with its runtime.
struct LoadGuard(DetectorHandle);

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if self.0.state().is_loading() {
            self.0.resolve(Err(DetectionError::ModelUnavailable(
                "model loader stopped before producing a detector".into(),
            )));
        }
    }
}

static SHARED_DETECTOR: OnceLock<DetectorHandle> = OnceLock::new();

/// Process-wide detector. The first caller's loader is spawned; every later
/// caller receives the same handle and its loader is dropped unused.
pub fn shared_detector<F>(loader: F) -> DetectorHandle
where
    F: Future<Output = Result<Arc<dyn FaceDetector>, DetectionError>> + Send + 'static,
{
    SHARED_DETECTOR
        .get_or_init(|| DetectorHandle::spawn_load(loader))
        .clone()
}

/// A detector that always returns the same boxes. Useful for demos and tests.
#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    pub faces: Vec<FaceBox>,
}

impl FixedDetector {
    pub fn new(faces: Vec<FaceBox>) -> Self {
        Self { faces }
    }
}

impl FaceDetector for FixedDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<FaceBox>, DetectionError> {
        Ok(self.faces.clone())
    }
}
