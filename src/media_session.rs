// THEORY:
// The `MediaSession` is the single owner of the two scarce resources of a capture
// session: the camera stream and the detection timer. Nobody else starts or
// stops them; `acquire` and `release` are the only mutators.
//
// Ordering contract:
// - `acquire`: open the stream, attach it, wait until the sink is playable, and
//   only then start the detection loop. A denied or failing camera forces the
//   `NoCamera` status and never starts the loop.
// - `release`: stop the detection loop first, then stop every track, then drop
//   the handle. A tick can therefore never observe a half-torn-down stream.
//
// Leak contract: every successful open is matched by exactly one track stop,
// including when acquisition is interrupted part-way or the session is dropped.

use crate::camera::{CameraConstraints, CameraDevice, MediaStream};
use crate::core_modules::analyzer::FrameQualityAnalyzer;
use crate::core_modules::face::DetectorHandle;
use crate::core_modules::frame::Frame;
use crate::core_modules::status::StableStatus;
use crate::detection_loop::DetectionLoop;
use crate::error::CameraError;
use crate::status_feed::StatusFeed;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Cloneable signal that interrupts an in-flight acquisition from another task.
/// Once fired it stays fired.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender is owned by `self`, so this only returns on cancellation.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Result of an acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Stream attached, playing, and the detection loop is running.
    Live,
    /// The camera could not be used; status is now `NoCamera`.
    Unavailable(CameraError),
    /// Cancelled before completion; nothing is held.
    Interrupted,
}

enum Race<T> {
    Done(T),
    Cancelled,
}

pub struct MediaSession {
    camera: Arc<dyn CameraDevice>,
    constraints: CameraConstraints,
    stream: Option<Arc<dyn MediaStream>>,
    detection: DetectionLoop,
    status: StatusFeed,
    cancel: CancelHandle,
    acquisitions: u64,
    releases: u64,
}

impl MediaSession {
    pub fn new(
        camera: Arc<dyn CameraDevice>,
        constraints: CameraConstraints,
        analyzer: Arc<FrameQualityAnalyzer>,
        detector: DetectorHandle,
        status: StatusFeed,
        detection_interval: Duration,
        cancel: CancelHandle,
    ) -> Self {
        let detection = DetectionLoop::new(detection_interval, analyzer, detector, status.clone());
        Self {
            camera,
            constraints,
            stream: None,
            detection,
            status,
            cancel,
            acquisitions: 0,
            releases: 0,
        }
    }

    async fn race<T>(cancel: &CancelHandle, work: impl Future<Output = T>) -> Race<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Race::Cancelled,
            value = work => Race::Done(value),
        }
    }

    /// Opens the camera and starts detection once the stream is playable.
    /// Calling it while a stream is already held does nothing.
    pub async fn acquire(&mut self) -> AcquireOutcome {
        if self.stream.is_some() {
            return AcquireOutcome::Live;
        }
        if self.cancel.is_cancelled() {
            return AcquireOutcome::Interrupted;
        }

        self.status.reset();
        info!(
            facing = ?self.constraints.facing,
            width = self.constraints.width,
            height = self.constraints.height,
            "requesting camera"
        );

        let opened = match Self::race(&self.cancel, self.camera.open(&self.constraints)).await {
            Race::Done(opened) => opened,
            Race::Cancelled => {
                info!("camera request interrupted");
                return AcquireOutcome::Interrupted;
            }
        };

        let stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "camera unavailable");
                self.status.force(StableStatus::NoCamera);
                return AcquireOutcome::Unavailable(err);
            }
        };

        // Held from here on, so a dropped or interrupted acquire still releases it.
        self.stream = Some(Arc::clone(&stream));
        self.acquisitions += 1;

        match Self::race(&self.cancel, stream.playable()).await {
            Race::Done(Ok(())) => {}
            Race::Done(Err(err)) => {
                warn!(error = %err, "camera stream failed to start");
                self.release();
                self.status.force(StableStatus::NoCamera);
                return AcquireOutcome::Unavailable(err);
            }
            Race::Cancelled => {
                info!("camera start interrupted");
                self.release();
                return AcquireOutcome::Interrupted;
            }
        }

        self.detection.start(stream);
        info!("camera stream live");
        AcquireOutcome::Live
    }

    /// Stops detection, then every track, then drops the stream.
    /// Returns `false` when nothing was held.
    pub fn release(&mut self) -> bool {
        self.detection.stop();
        match self.stream.take() {
            Some(stream) => {
                stream.stop_tracks();
                self.releases += 1;
                info!("camera stream released");
                true
            }
            None => false,
        }
    }

    /// The frame currently on the sink, if the stream is ready for analysis.
    pub fn snapshot(&self) -> Option<Frame> {
        let stream = self.stream.as_ref()?;
        if !stream.ready_state().can_analyze() {
            return None;
        }
        stream.current_frame().filter(|frame| !frame.is_empty())
    }

    pub fn is_held(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_detection_running(&self) -> bool {
        self.detection.is_running()
    }

    /// Successful opens and releases so far; equal whenever nothing is held.
    pub fn lifecycle_counts(&self) -> (u64, u64) {
        (self.acquisitions, self.releases)
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.release();
    }
}
