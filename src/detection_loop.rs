// THEORY:
// The `DetectionLoop` owns the one periodic timer of a capture session. On every
// tick it pulls the current frame from the attached stream and runs it through
// the analyzer and the status feed.
//
// Key rules:
// 1.  **Fixed cadence**: ticks fire every `interval` (150 ms by default), the
//     first one a full interval after start. Ticks run one after another in a
//     single task; if a tick overruns, missed ticks are skipped rather than
//     queued, so inference work can never pile up.
// 2.  **Fresh frames only**: a tick is skipped when the sink is not at
//     `HaveEnoughData` or has no frame, and while the model is still loading.
// 3.  **Swallowed failures**: a detector error on one tick is logged and
//     dropped; the next tick simply tries again.
// 4.  **Idempotent lifecycle**: `start` while running does nothing, `stop` is
//     safe at any time. Each run carries a liveness flag that `stop` clears, so a
//     result computed after stopping is discarded instead of applied.

use crate::camera::MediaStream;
use crate::core_modules::analyzer::{FrameQualityAnalyzer, FrameReport};
use crate::core_modules::debounce::DebounceStep;
use crate::core_modules::face::{DetectorHandle, ModelState};
use crate::status_feed::StatusFeed;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

pub const DEFAULT_DETECTION_INTERVAL: Duration = Duration::from_millis(150);

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The sink had no usable frame yet.
    NotReady,
    /// The detector model is still loading.
    ModelLoading,
    /// The frame was classified and fed to the status feed.
    Classified { report: FrameReport, step: DebounceStep },
    /// The detector failed on this frame; nothing was applied.
    DetectionFailed,
    /// The loop was stopped while the tick ran; the result was discarded.
    Discarded,
}

struct RunningLoop {
    handle: JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

pub struct DetectionLoop {
    interval: Duration,
    analyzer: Arc<FrameQualityAnalyzer>,
    detector: DetectorHandle,
    status: StatusFeed,
    running: Option<RunningLoop>,
}

impl DetectionLoop {
    pub fn new(
        interval: Duration,
        analyzer: Arc<FrameQualityAnalyzer>,
        detector: DetectorHandle,
        status: StatusFeed,
    ) -> Self {
        Self {
            interval,
            analyzer,
            detector,
            status,
            running: None,
        }
    }

    /// Starts ticking against `stream`. Returns `false` if already running.
    pub fn start(&mut self, stream: Arc<dyn MediaStream>) -> bool {
        if self.is_running() {
            return false;
        }

        let alive = Arc::new(AtomicBool::new(true));
        let interval = self.interval;
        let analyzer = Arc::clone(&self.analyzer);
        let detector = self.detector.clone();
        let status = self.status.clone();
        let task_alive = Arc::clone(&alive);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !task_alive.load(Ordering::Acquire) {
                    break;
                }
                let model = detector.state();
                let outcome = run_tick(stream.as_ref(), &analyzer, &model, &status, &task_alive);
                if outcome == TickOutcome::Discarded {
                    break;
                }
            }
        });

        info!(interval_ms = self.interval.as_millis() as u64, "detection loop started");
        self.running = Some(RunningLoop { handle, alive });
        true
    }

    /// Stops the timer. Returns `false` if nothing was running.
    pub fn stop(&mut self) -> bool {
        match self.running.take() {
            Some(running) => {
                running.alive.store(false, Ordering::Release);
                running.handle.abort();
                info!("detection loop stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|running| !running.handle.is_finished())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One detection cycle: fetch, analyze, debounce.
pub fn run_tick(
    stream: &dyn MediaStream,
    analyzer: &FrameQualityAnalyzer,
    model: &ModelState,
    status: &StatusFeed,
    alive: &AtomicBool,
) -> TickOutcome {
    if !stream.ready_state().can_analyze() {
        return TickOutcome::NotReady;
    }
    let Some(frame) = stream.current_frame().filter(|frame| !frame.is_empty()) else {
        return TickOutcome::NotReady;
    };

    let report = match analyzer.analyze(&frame, model) {
        Ok(Some(report)) => report,
        Ok(None) => return TickOutcome::ModelLoading,
        Err(err) => {
            debug!(frame = frame.index, error = %err, "detection failed; retrying next tick");
            return TickOutcome::DetectionFailed;
        }
    };

    if !alive.load(Ordering::Acquire) {
        return TickOutcome::Discarded;
    }

    let step = status.push(report.classification);
    debug!(
        frame = frame.index,
        classification = %report.classification,
        status = %step.status,
        "tick classified"
    );
    TickOutcome::Classified { report, step }
}
