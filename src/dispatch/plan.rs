use std::time::Duration;

/// Floor on the gap between two consecutive commands.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(50);
/// Ceiling on the gap between two consecutive commands. Small batches
/// finish early instead of trickling across the whole budget.
pub const DEFAULT_MAX_STEP: Duration = Duration::from_secs(2);
/// Ceiling on the drawing window when no cadence is configured.
pub const DEFAULT_MAX_WINDOW: Duration = Duration::from_secs(10);
/// Per-command pacing used to size the window when no cadence is configured.
const UNPACED_STEP: Duration = Duration::from_millis(200);

/// Timing for one batch: unit `i` fires `i × per_command` after scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPlan {
    pub count: usize,
    pub budget: Duration,
    pub per_command: Duration,
}

impl DispatchPlan {
    /// `budget` is the total drawing time. Zero means unpaced: the batch
    /// gets `count × 200ms`, never more than `max_window`. The gap between
    /// commands stays within `min_delay..=DEFAULT_MAX_STEP`; the floor wins
    /// if the two ever cross.
    pub fn new(count: usize, budget: Duration, min_delay: Duration, max_window: Duration) -> Self {
        let n = u32::try_from(count.max(1)).unwrap_or(u32::MAX);
        let budget = if budget.is_zero() {
            UNPACED_STEP.saturating_mul(n).min(max_window)
        } else {
            budget
        };
        Self {
            count,
            budget,
            per_command: (budget / n).min(DEFAULT_MAX_STEP).max(min_delay),
        }
    }

    pub fn offset(&self, index: usize) -> Duration {
        self.per_command
            .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// When the last unit fires, relative to scheduling.
    pub fn window(&self) -> Duration {
        self.offset(self.count.saturating_sub(1))
    }
}
