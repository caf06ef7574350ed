//! Upload progress with attempt supersession.
//!
//! Each upload attempt gets a fresh id from [`ProgressTracker::begin_attempt`].
//! Reports carrying any other id are dropped, so a late callback from an
//! abandoned attempt can never move the visible percentage.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    /// 0 before the first attempt.
    pub attempt: u64,
    /// 0-100, non-decreasing within one attempt.
    pub percent: u8,
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    sender: Arc<watch::Sender<UploadProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(UploadProgress::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn current(&self) -> UploadProgress {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.sender.subscribe()
    }

    /// Start a new attempt at 0% and return its id. Any earlier attempt is
    /// superseded.
    pub fn begin_attempt(&self) -> u64 {
        let mut attempt = 0;
        self.sender.send_modify(|p| {
            p.attempt += 1;
            p.percent = 0;
            attempt = p.attempt;
        });
        attempt
    }

    /// Record a report for `attempt`. Returns `true` when the visible value
    /// changed.
    pub fn report(&self, attempt: u64, percent: u8) -> bool {
        let percent = percent.min(100);
        self.sender.send_if_modified(|p| {
            if p.attempt != attempt || percent <= p.percent {
                return false;
            }
            p.percent = percent;
            true
        })
    }

    /// Supersede the current attempt without starting a new one.
    pub fn invalidate(&self) {
        self.sender.send_modify(|p| {
            p.attempt += 1;
            p.percent = 0;
        });
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_are_monotonic_and_clamped() {
        let tracker = ProgressTracker::new();
        let attempt = tracker.begin_attempt();

        assert!(tracker.report(attempt, 30));
        assert!(!tracker.report(attempt, 20));
        assert!(!tracker.report(attempt, 30));
        assert!(tracker.report(attempt, 250));
        assert_eq!(tracker.current().percent, 100);
    }

    #[test]
    fn stale_attempt_reports_are_dropped() {
        let tracker = ProgressTracker::new();
        let first = tracker.begin_attempt();
        tracker.report(first, 50);

        let second = tracker.begin_attempt();
        assert_eq!(tracker.current(), UploadProgress { attempt: second, percent: 0 });

        assert!(!tracker.report(first, 90));
        assert_eq!(tracker.current().percent, 0);
        assert!(tracker.report(second, 10));
    }

    #[test]
    fn invalidate_supersedes_current_attempt() {
        let tracker = ProgressTracker::new();
        let attempt = tracker.begin_attempt();
        tracker.report(attempt, 70);
        tracker.invalidate();

        assert!(!tracker.report(attempt, 80));
        assert_eq!(tracker.current().percent, 0);
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let tracker = ProgressTracker::new();
        let mut rx = tracker.subscribe();
        let attempt = tracker.begin_attempt();
        rx.changed().await.unwrap();

        tracker.report(attempt, 60);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().percent, 60);
    }
}
