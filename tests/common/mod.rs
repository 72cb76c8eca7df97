//! In-process camera, detector and host doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use selfie_vision::camera::{CameraConstraints, CameraDevice, MediaStream, ReadyState};
use selfie_vision::core_modules::face::{DetectionError, FaceBox, FaceDetector};
use selfie_vision::core_modules::frame::Frame;
use selfie_vision::core_modules::pixel::pixel::Pixel;
use selfie_vision::error::CameraError;
use selfie_vision::session::CaptureHost;
use selfie_vision::CapturedImage;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;
pub const TICK: Duration = Duration::from_millis(150);

pub fn bright_frame() -> Frame {
    Frame::solid(FRAME_WIDTH, FRAME_HEIGHT, Pixel::new(200, 170, 150, 255), 0)
}

pub fn dark_frame() -> Frame {
    Frame::solid(FRAME_WIDTH, FRAME_HEIGHT, Pixel::new(12, 10, 9, 255), 0)
}

/// A single face in the middle of a 640x480 frame, large enough to pass.
pub fn centered_face() -> FaceBox {
    FaceBox::new(220.0, 140.0, 200.0, 200.0)
}

pub struct FakeStream {
    frame: Mutex<Frame>,
    stops: AtomicUsize,
    hold_start: Option<Arc<Notify>>,
}

impl FakeStream {
    pub fn new(frame: Frame) -> Arc<Self> {
        Arc::new(Self {
            frame: Mutex::new(frame),
            stops: AtomicUsize::new(0),
            hold_start: None,
        })
    }

    /// A stream whose `playable` only resolves once `gate` is notified.
    pub fn gated(frame: Frame, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            frame: Mutex::new(frame),
            stops: AtomicUsize::new(0),
            hold_start: Some(gate),
        })
    }

    pub fn set_frame(&self, frame: Frame) {
        *self.frame.lock().unwrap() = frame;
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaStream for FakeStream {
    fn ready_state(&self) -> ReadyState {
        ReadyState::HaveEnoughData
    }

    fn current_frame(&self) -> Option<Frame> {
        Some(self.frame.lock().unwrap().clone())
    }

    async fn playable(&self) -> Result<(), CameraError> {
        if let Some(gate) = &self.hold_start {
            gate.notified().await;
        }
        Ok(())
    }

    fn stop_tracks(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.stops() == 0
    }
}

/// Hands out the same stream on every open, or refuses.
pub struct FakeCamera {
    pub stream: Arc<FakeStream>,
    deny: Option<CameraError>,
    opens: AtomicUsize,
}

impl FakeCamera {
    pub fn new(stream: Arc<FakeStream>) -> Arc<Self> {
        Arc::new(Self {
            stream,
            deny: None,
            opens: AtomicUsize::new(0),
        })
    }

    pub fn denying(error: CameraError) -> Arc<Self> {
        Arc::new(Self {
            stream: FakeStream::new(bright_frame()),
            deny: Some(error),
            opens: AtomicUsize::new(0),
        })
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn open(&self, _constraints: &CameraConstraints) -> Result<Arc<dyn MediaStream>, CameraError> {
        if let Some(error) = &self.deny {
            return Err(error.clone());
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(self.stream.clone())
    }
}

/// Plays back a scripted list of detections, then repeats `fallback`.
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Vec<FaceBox>>>,
    fallback: Vec<FaceBox>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<FaceBox>>, fallback: Vec<FaceBox>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(faces: Vec<FaceBox>) -> Arc<Self> {
        Self::new(Vec::new(), faces)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<FaceBox>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Captured(CapturedImage),
    /// Whether the probed stream was still live when the callback ran.
    Cancelled { stream_live: bool },
}

/// Records every callback, in order.
#[derive(Clone)]
pub struct RecordingHost {
    events: Arc<Mutex<Vec<HostEvent>>>,
    probe: Option<Arc<FakeStream>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            probe: None,
        }
    }

    pub fn probing(stream: Arc<FakeStream>) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            probe: Some(stream),
        }
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn captures(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, HostEvent::Captured(_)))
            .count()
    }

    pub fn cancels(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, HostEvent::Cancelled { .. }))
            .count()
    }
}

impl CaptureHost for RecordingHost {
    fn on_capture(&mut self, image: CapturedImage) {
        self.events.lock().unwrap().push(HostEvent::Captured(image));
    }

    fn on_cancel(&mut self) {
        let stream_live = self.probe.as_ref().is_some_and(|stream| stream.is_live());
        self.events
            .lock()
            .unwrap()
            .push(HostEvent::Cancelled { stream_live });
    }
}

/// Sleeps to just past the `n`-th tick counted from now, assuming the loop
/// started now.
pub async fn advance_ticks(n: u32) {
    tokio::time::sleep(TICK * n + Duration::from_millis(10)).await;
}

/// Sleeps exactly one detection interval.
pub async fn next_tick() {
    tokio::time::sleep(TICK).await;
}
