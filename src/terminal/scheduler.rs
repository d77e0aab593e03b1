//! Flush scheduler: debounce + max-interval pacing for snapshot emission
//! (spec §4.3).
//!
//! `FlushScheduler` is a plain state machine, not a task of its own -
//! [`super::VirtualTerminal`] drives it from a single `tokio::select!` loop
//! so that "whichever fires first" falls naturally out of `select!`'s own
//! semantics instead of needing a second layer of cancellation.

use tokio::time::Instant;

/// Default debounce window (spec §4.1).
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
/// Default maximum interval between flushes under continuous output.
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 300;

#[derive(Debug)]
pub struct FlushScheduler {
    debounce_ms: u64,
    max_interval_ms: u64,
    debounce_deadline: Option<Instant>,
    interval_deadline: Option<Instant>,
    disposed: bool,
}

impl FlushScheduler {
    #[must_use]
    pub fn new(debounce_ms: u64, max_interval_ms: u64) -> Self {
        Self {
            debounce_ms,
            max_interval_ms,
            debounce_deadline: None,
            interval_deadline: None,
            disposed: false,
        }
    }

    /// Reset the debounce timer; start the interval timer if it isn't
    /// already running. No-op after `dispose`.
    pub fn notify(&mut self) {
        if self.disposed {
            return;
        }
        let now = Instant::now();
        self.debounce_deadline = Some(now + std::time::Duration::from_millis(self.debounce_ms));
        if self.interval_deadline.is_none() {
            self.interval_deadline =
                Some(now + std::time::Duration::from_millis(self.max_interval_ms));
        }
    }

    /// The earliest deadline to wait on, if any timer is running.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.debounce_deadline, self.interval_deadline) {
            (Some(d), Some(i)) => Some(d.min(i)),
            (Some(d), None) => Some(d),
            (None, Some(i)) => Some(i),
            (None, None) => None,
        }
    }

    /// Clear both timers (called once the owner has acted on a fire,
    /// whether from a natural deadline or a forced `flush`).
    pub fn clear(&mut self) {
        self.debounce_deadline = None;
        self.interval_deadline = None;
    }

    /// True if either timer is currently running - callers use this to
    /// decide whether an immediate `flush()` should trigger a capture at
    /// all.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.debounce_deadline.is_some() || self.interval_deadline.is_some()
    }

    /// Cancel both timers; subsequent `notify()` calls become no-ops.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn notify_starts_both_timers_on_first_call() {
        let mut s = FlushScheduler::new(100, 300);
        assert!(s.next_deadline().is_none());
        s.notify();
        assert!(s.next_deadline().is_some());
        assert!(s.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_deadline_is_the_earlier_one() {
        let mut s = FlushScheduler::new(100, 300);
        s.notify();
        let debounce_target = Instant::now() + std::time::Duration::from_millis(100);
        let next = s.next_deadline().unwrap();
        assert!(next <= debounce_target + std::time::Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_notify_does_not_restart_interval_timer() {
        let mut s = FlushScheduler::new(100, 300);
        s.notify();
        let interval_first = s.interval_deadline;
        tokio::time::advance(std::time::Duration::from_millis(50)).await;
        s.notify();
        assert_eq!(s.interval_deadline, interval_first);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_makes_notify_a_no_op() {
        let mut s = FlushScheduler::new(100, 300);
        s.dispose();
        s.notify();
        assert!(s.next_deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_after_fire_resets_state() {
        let mut s = FlushScheduler::new(100, 300);
        s.notify();
        s.clear();
        assert!(s.next_deadline().is_none());
        assert!(!s.is_active());
    }
}
