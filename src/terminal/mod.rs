//! Virtual terminal: combines [`emulator::EmulatorWrapper`] with
//! [`scheduler::FlushScheduler`] behind the write/resize/capture surface
//! spec §4.1 describes.
//!
//! Two ways to drive it:
//! - [`VirtualTerminal::run`] for interactive use (`watch`): a background
//!   task that paces emission with the flush scheduler and invokes a
//!   callback for each distinct snapshot.
//! - [`VirtualTerminal::capture_now`] for the record engine, which needs an
//!   unpaced, deterministically-timestamped capture on each explicit
//!   `"snapshot"` step.

pub mod emulator;
pub mod scheduler;

use std::future::Future;

use emulator::EmulatorWrapper;
use scheduler::FlushScheduler;
use tokio::sync::mpsc;

use crate::snapshot::Snapshot;

/// Commands accepted by [`VirtualTerminal::run`]'s driving channel.
#[derive(Debug)]
pub enum Command {
    Write(Vec<u8>),
    Resize(u16, u16),
    /// Force an out-of-cycle capture, as if the scheduler's deadline had
    /// fired (a no-op if no timer is running).
    Flush,
}

pub struct VirtualTerminal {
    emulator: EmulatorWrapper,
    scheduler: FlushScheduler,
    last_snapshot: Option<Snapshot>,
}

impl VirtualTerminal {
    #[must_use]
    pub fn new(
        cols: u16,
        rows: u16,
        scrollback_limit: usize,
        debounce_ms: u64,
        max_interval_ms: u64,
    ) -> Self {
        Self {
            emulator: EmulatorWrapper::new(cols, rows, scrollback_limit),
            scheduler: FlushScheduler::new(debounce_ms, max_interval_ms),
            last_snapshot: None,
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.emulator.process(bytes);
        self.scheduler.notify();
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.emulator.resize(cols, rows);
        self.scheduler.notify();
    }

    #[must_use]
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn dispose(&mut self) {
        self.scheduler.dispose();
    }

    /// Capture unconditionally at `timestamp`, bypassing the scheduler.
    /// Used by the record engine, whose `"snapshot"` steps are
    /// deterministically timestamped rather than debounced.
    pub fn capture_now(&mut self, timestamp: i64) -> Snapshot {
        let snap = self.emulator.capture(timestamp);
        self.last_snapshot = Some(snap.clone());
        snap
    }

    /// Capture at `timestamp` and return `(snapshot, previous)` only if it
    /// differs from the last one emitted (spec's dedup-via-structural-
    /// equality rule). Updates `last_snapshot` as a side effect.
    fn capture_if_changed(&mut self, timestamp: i64) -> Option<(Snapshot, Option<Snapshot>)> {
        let snap = self.emulator.capture(timestamp);
        let prev = self.last_snapshot.clone();
        let changed = prev.as_ref().is_none_or(|p| !p.equal_ignoring_timestamp(&snap));
        if !changed {
            return None;
        }
        self.last_snapshot = Some(snap.clone());
        Some((snap, prev))
    }

    /// Drive the debounce/max-interval capture loop until `commands`
    /// closes. `on_change` is awaited in-line (this is the single-threaded
    /// cooperative coroutine from spec §1, realized as a tokio task rather
    /// than an OS thread): nothing else runs while it's pending, so a slow
    /// callback naturally collapses any writes/flushes that arrive in the
    /// meantime into at most one follow-up capture once it returns.
    pub async fn run<F, Fut>(mut self, mut commands: mpsc::UnboundedReceiver<Command>, mut on_change: F)
    where
        F: FnMut(Snapshot, Option<Snapshot>) -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            let wait = match self.scheduler.next_deadline() {
                Some(deadline) => tokio::time::sleep_until(deadline),
                None => tokio::time::sleep(std::time::Duration::from_secs(3600)),
            };
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Write(bytes)) => self.write(&bytes),
                        Some(Command::Resize(cols, rows)) => self.resize(cols, rows),
                        Some(Command::Flush) => {
                            if self.scheduler.is_active() {
                                self.scheduler.clear();
                                self.emit(&mut on_change).await;
                            }
                        }
                        None => {
                            self.dispose();
                            break;
                        }
                    }
                }
                () = wait, if self.scheduler.is_active() => {
                    self.scheduler.clear();
                    self.emit(&mut on_change).await;
                }
            }
        }
    }

    async fn emit<F, Fut>(&mut self, on_change: &mut F)
    where
        F: FnMut(Snapshot, Option<Snapshot>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let timestamp = chrono::Utc::now().timestamp_millis();
        if let Some((snap, prev)) = self.capture_if_changed(timestamp) {
            on_change(snap, prev).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn run_emits_exactly_once_per_debounce_settle() {
        let vt = VirtualTerminal::new(80, 24, 1000, 50, 500);
        let (tx, rx) = mpsc::unbounded_channel();
        let events = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let events2 = events.clone();

        let handle = tokio::spawn(vt.run(rx, move |snap, _prev| {
            let events = events2.clone();
            async move {
                events.lock().await.push(snap.lines[0].plain_text());
            }
        }));

        tx.send(Command::Write(b"hi\r\n".to_vec())).unwrap();
        tokio::time::advance(std::time::Duration::from_millis(60)).await;
        tokio::task::yield_now().await;

        drop(tx);
        let _ = tokio::time::timeout(std::time::Duration::from_millis(10), handle).await;

        let seen = events.lock().await;
        assert!(seen.iter().any(|l| l.trim_end() == "hi"));
    }

    #[test]
    fn capture_now_bypasses_scheduler_and_updates_last_snapshot() {
        let mut vt = VirtualTerminal::new(80, 24, 100, 100, 300);
        vt.write(b"x\r\n");
        let snap = vt.capture_now(1234);
        assert_eq!(snap.timestamp, 1234);
        assert!(vt.last_snapshot().is_some());
    }
}
