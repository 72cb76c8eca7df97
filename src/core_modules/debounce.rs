// THEORY:
// The `DebounceFilter` turns the flickering per-frame classification stream into a
// stable status. It is a tiny explicit state object, `{ last classification,
// run length, stable status }`, with a single `step` transition so it can be
// exercised without any camera or timer.
//
// Rules:
// 1.  A classification equal to the previous one extends the run; anything else
//     starts a new run of length 1.
// 2.  Once the run reaches the debounce count and the classification differs from
//     the current stable status, the stable status changes and `changed` is set.
// 3.  `changed` is reported exactly once per stable change, never once per
//     matching frame; it is what drives the one-shot visual pulse.

use crate::core_modules::status::{FrameClassification, StableStatus};

pub const DEFAULT_DEBOUNCE_COUNT: u32 = 3;

/// Outcome of feeding one classification into the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceStep {
    pub status: StableStatus,
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct DebounceFilter {
    threshold: u32,
    last_classification: Option<FrameClassification>,
    run_length: u32,
    stable: StableStatus,
}

impl Default for DebounceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_COUNT)
    }
}

impl DebounceFilter {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            last_classification: None,
            run_length: 0,
            stable: StableStatus::Loading,
        }
    }

    pub fn step(&mut self, classification: FrameClassification) -> DebounceStep {
        if self.last_classification == Some(classification) {
            self.run_length = self.run_length.saturating_add(1);
        } else {
            self.last_classification = Some(classification);
            self.run_length = 1;
        }

        let candidate = StableStatus::from(classification);
        let changed = self.run_length >= self.threshold && candidate != self.stable;
        if changed {
            self.stable = candidate;
        }

        DebounceStep {
            status: self.stable,
            changed,
        }
    }

    /// Sets the stable status directly, without waiting for a run.
    /// Returns whether the status actually changed.
    pub fn force(&mut self, status: StableStatus) -> bool {
        self.last_classification = None;
        self.run_length = 0;
        let changed = self.stable != status;
        self.stable = status;
        changed
    }

    /// Back to `Loading` with an empty run.
    pub fn reset(&mut self) -> bool {
        self.force(StableStatus::Loading)
    }

    pub fn stable(&self) -> StableStatus {
        self.stable
    }

    pub fn run_length(&self) -> u32 {
        self.run_length
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
