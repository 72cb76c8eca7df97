//! Bounded retake policy for the preview screen.
//!
//! The counter only moves on an explicit rejection of a preview. Once
//! `retake_count + 1` would reach the ceiling, the current photo is final.

pub const DEFAULT_MAX_RETAKES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetakeDecision {
    /// Go back to the camera; `attempt` is the new retake count.
    Retake { attempt: u32 },
    /// No retakes left; the preview stays and is final.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetakePolicy {
    max_retakes: u32,
    retake_count: u32,
}

impl Default for RetakePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETAKES)
    }
}

impl RetakePolicy {
    pub fn new(max_retakes: u32) -> Self {
        Self {
            max_retakes,
            retake_count: 0,
        }
    }

    /// Whether rejecting the current preview would send the user back to the camera.
    pub fn can_retake(&self) -> bool {
        self.retake_count + 1 < self.max_retakes
    }

    /// Records a rejection of the current preview.
    pub fn reject(&mut self) -> RetakeDecision {
        if self.can_retake() {
            self.retake_count += 1;
            RetakeDecision::Retake {
                attempt: self.retake_count,
            }
        } else {
            RetakeDecision::Exhausted
        }
    }

    pub fn retake_count(&self) -> u32 {
        self.retake_count
    }

    pub fn max_retakes(&self) -> u32 {
        self.max_retakes
    }

    pub fn remaining(&self) -> u32 {
        self.max_retakes.saturating_sub(self.retake_count + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offers_retakes_until_ceiling() {
        let mut policy = RetakePolicy::default();
        assert!(policy.can_retake());
        assert_eq!(policy.remaining(), 2);

        assert_eq!(policy.reject(), RetakeDecision::Retake { attempt: 1 });
        assert_eq!(policy.reject(), RetakeDecision::Retake { attempt: 2 });
        assert!(!policy.can_retake());
        assert_eq!(policy.remaining(), 0);

        assert_eq!(policy.reject(), RetakeDecision::Exhausted);
        assert_eq!(policy.retake_count(), 2);
    }

    #[test]
    fn offered_iff_count_below_ceiling_minus_one() {
        for max in 0..6 {
            let mut policy = RetakePolicy::new(max);
            for k in 0..8 {
                assert_eq!(policy.retake_count(), k.min(max.saturating_sub(1)));
                let offered = policy.can_retake();
                assert_eq!(offered, policy.retake_count() + 1 < max);
                policy.reject();
            }
        }
    }

    #[test]
    fn zero_or_one_max_never_retakes() {
        assert_eq!(RetakePolicy::new(0).reject(), RetakeDecision::Exhausted);
        assert_eq!(RetakePolicy::new(1).reject(), RetakeDecision::Exhausted);
    }
}
