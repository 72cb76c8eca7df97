// THEORY:
// `StatusFeed` is the only place the stable status is mutated. It owns the
// debounce filter behind a mutex and republishes every stable value on a watch
// channel, so the UI layer (and the capture gate) only ever read it.
//
// Every stable change also goes out once on a broadcast channel as a
// `StatusPulse`. That pulse is what the preview uses for its one-shot visual
// flash; it is never repeated for frames that merely confirm the status.

use crate::core_modules::debounce::{DebounceFilter, DebounceStep};
use crate::core_modules::status::{FrameClassification, StableStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::debug;

const PULSE_CHANNEL_CAPACITY: usize = 16;

/// Emitted once per stable status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPulse {
    pub status: StableStatus,
    /// Increments with every change since the feed was created.
    pub sequence: u64,
}

struct FeedState {
    filter: DebounceFilter,
    sequence: u64,
}

#[derive(Clone)]
pub struct StatusFeed {
    state: Arc<Mutex<FeedState>>,
    status_tx: Arc<watch::Sender<StableStatus>>,
    pulse_tx: broadcast::Sender<StatusPulse>,
}

impl StatusFeed {
    pub fn new(debounce_count: u32) -> Self {
        let (status_tx, _) = watch::channel(StableStatus::Loading);
        let (pulse_tx, _) = broadcast::channel(PULSE_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(FeedState {
                filter: DebounceFilter::new(debounce_count),
                sequence: 0,
            })),
            status_tx: Arc::new(status_tx),
            pulse_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feeds one per-frame classification through the debounce filter.
    pub fn push(&self, classification: FrameClassification) -> DebounceStep {
        let mut state = self.lock();
        let step = state.filter.step(classification);
        if step.changed {
            state.sequence += 1;
            self.publish(step.status, state.sequence);
        }
        step
    }

    /// Sets a status immediately, bypassing the debounce run.
    pub fn force(&self, status: StableStatus) -> bool {
        let mut state = self.lock();
        let changed = state.filter.force(status);
        if changed {
            state.sequence += 1;
            self.publish(status, state.sequence);
        }
        changed
    }

    /// Back to `Loading`, e.g. when a new stream is acquired.
    pub fn reset(&self) -> bool {
        self.force(StableStatus::Loading)
    }

    fn publish(&self, status: StableStatus, sequence: u64) {
        debug!(%status, sequence, "stable status changed");
        self.status_tx.send_replace(status);
        // No subscribers is fine; the pulse is cosmetic.
        let _ = self.pulse_tx.send(StatusPulse { status, sequence });
    }

    pub fn current(&self) -> StableStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<StableStatus> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_pulses(&self) -> broadcast::Receiver<StatusPulse> {
        self.pulse_tx.subscribe()
    }
}
