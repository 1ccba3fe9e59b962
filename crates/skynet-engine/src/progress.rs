//! Day callback that logs progress through the run.

use skynet_core::factory::DaySummary;
use skynet_core::runner::DayCallback;
use tracing::{debug, info};

/// Logs each completed day, with a fuller line every `every` days.
pub struct ProgressCallback {
    every: u32,
}

impl ProgressCallback {
    /// Create a callback that reports at `info` every `every` days.
    ///
    /// An interval of zero keeps every day at `debug`.
    pub const fn new(every: u32) -> Self {
        Self { every }
    }

    fn is_milestone(&self, day: u32) -> bool {
        day.checked_rem(self.every) == Some(0)
    }
}

impl DayCallback for ProgressCallback {
    fn on_day(&mut self, summary: &DaySummary) {
        if self.is_milestone(summary.day) {
            info!(
                day = summary.day,
                parts_produced = summary.parts_produced,
                parts_available = summary.parts_available,
                ledger = ?summary.ledger,
                ledger_spread = summary.ledger_spread(),
                "Simulation progress"
            );
        } else {
            debug!(
                day = summary.day,
                parts_available = summary.parts_available,
                "Day finished"
            );
        }
    }
}
