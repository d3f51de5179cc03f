//! Estimated progress for a running format.
//!
//! mkfs prints nothing useful while it works, so the displayed percentage
//! creeps towards a ceiling below 100 and only jumps to the real terminal
//! value once the formatter records the outcome.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use super::state::OperationState;

/// Highest value shown before the formatter reports success
pub const PROGRESS_CEILING: u8 = 95;

/// Delay between two estimates
pub const TICK_INTERVAL: Duration = Duration::from_millis(300);

/// Moves one eighth of the way to the ceiling, at least one point
pub fn advance(percent: u8) -> u8 {
    if percent >= PROGRESS_CEILING {
        return percent;
    }
    let step = ((PROGRESS_CEILING - percent) / 8).max(1);
    (percent + step).min(PROGRESS_CEILING)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// Estimate while the operation is still running
    Advancing(u8),
    /// Terminal value recorded by the formatter: 100 or 0
    Settled(u8),
}

impl ProgressUpdate {
    pub fn percent(&self) -> u8 {
        match self {
            ProgressUpdate::Advancing(p) | ProgressUpdate::Settled(p) => *p,
        }
    }
}

/// Read-only observer of `OperationState`
pub struct ProgressReporter {
    state: Arc<OperationState>,
    displayed: u8,
    settled: bool,
}

impl ProgressReporter {
    pub fn new(state: Arc<OperationState>) -> Self {
        Self {
            state,
            displayed: 0,
            settled: false,
        }
    }

    /// Next value to publish, or `None` once settled
    pub fn tick(&mut self) -> Option<ProgressUpdate> {
        if self.settled {
            return None;
        }

        let snapshot = self.state.snapshot();
        if !snapshot.running {
            self.settled = true;
            self.displayed = snapshot.percent;
            return Some(ProgressUpdate::Settled(snapshot.percent));
        }

        self.displayed = advance(self.displayed);
        Some(ProgressUpdate::Advancing(self.displayed))
    }

    /// Publishes an update every `period` until the operation settles.
    /// The first estimate comes one period after the call, by which time
    /// the formatter has claimed the state. Stops early if the receiver
    /// goes away.
    pub async fn run<T, F>(mut self, period: Duration, sink: UnboundedSender<T>, wrap: F)
    where
        F: Fn(ProgressUpdate) -> T,
    {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let Some(update) = self.tick() else {
                return;
            };
            if sink.send(wrap(update)).is_err() {
                return;
            }
            if matches!(update, ProgressUpdate::Settled(_)) {
                return;
            }
        }
    }
}
