//! Capture debouncing with a re-entrancy guard.
//!
//! Every accepted notification pushes the deadline to `now + window`; the
//! capture is due once the clock passes the deadline with no further
//! notifications. Notifications arriving while a capture is in flight are
//! rejected so a capture never interleaves with itself.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
    capturing: bool,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            capturing: false,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a qualifying change at `now`. Returns false if it was ignored.
    pub fn notify(&mut self, now: Instant) -> bool {
        if self.capturing {
            return false;
        }
        self.deadline = Some(now + self.window);
        true
    }

    /// When the pending capture fires, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the pending capture if it is due at `now`.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn begin_capture(&mut self) {
        self.capturing = true;
    }

    pub fn end_capture(&mut self) {
        self.capturing = false;
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(1000);

    #[test]
    fn test_burst_within_window_yields_one_capture_at_last_plus_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        let arrivals = [0u64, 200, 450, 900, 1300];
        for offset in arrivals {
            assert!(debouncer.notify(start + Duration::from_millis(offset)));
        }

        let expected = start + Duration::from_millis(1300) + WINDOW;
        assert_eq!(debouncer.deadline(), Some(expected));

        assert!(!debouncer.take_due(expected - Duration::from_millis(1)));
        assert!(debouncer.take_due(expected));
        assert!(!debouncer.take_due(expected + WINDOW));
        assert_eq!(debouncer.deadline(), None);
    }

    #[test]
    fn test_notifications_ignored_while_capturing() {
        let now = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.begin_capture();
        assert!(debouncer.is_capturing());
        assert!(!debouncer.notify(now));
        assert_eq!(debouncer.deadline(), None);

        debouncer.end_capture();
        assert!(debouncer.notify(now));
        assert_eq!(debouncer.deadline(), Some(now + WINDOW));
    }

    #[test]
    fn test_separate_bursts_capture_separately() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.notify(start);
        assert!(debouncer.take_due(start + WINDOW));

        let later = start + Duration::from_millis(5000);
        debouncer.notify(later);
        assert!(debouncer.take_due(later + WINDOW));
    }
}
