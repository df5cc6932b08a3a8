//! Quiescence scheduler: decides "the UI has settled".
//!
//! Implemented with `std::sync::{Mutex, Condvar}` plus a generation counter
//! and a per-notify debounce thread, mirroring the background-thread /
//! shared-state shape the teacher uses for its PTY reader
//! (`Arc<Mutex<_>>` + `AtomicBool` liveness flags in
//! `src/runtime/attach.rs`), rather than a bespoke async reactor — spec.md
//! §4.4/§9 leave the concurrency primitive unspecified so long as the
//! ordering guarantee holds.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Time after the last received byte before the stream is declared idle.
pub const IDLE_DEBOUNCE: Duration = Duration::from_millis(60);

/// When a waiter arms before any byte has ever arrived (or after the last
/// scheduled debounce has already fired), it still resolves after roughly
/// this period, bounded above by the caller's timeout.
pub const INITIAL_IDLE_FALLBACK: Duration = Duration::from_millis(20);

struct State {
    /// Bumped on every `notify`; a debounce thread compares its captured
    /// generation against this to detect being superseded.
    generation: u64,
    /// The highest generation whose debounce has fired with no superseding
    /// `notify` in between.
    fired_generation: u64,
    /// Whether a debounce timer is currently scheduled (i.e. the most
    /// recent `notify`'s timer hasn't fired yet).
    pending: bool,
    /// Whether at least one byte has ever been received.
    ever_received: bool,
    /// Set by `close`; every waiter checks this and returns `false` (not
    /// success) as soon as it observes it, instead of waiting out its
    /// timeout.
    closed: bool,
}

/// Observes PTY-data arrival timestamps and lets many callers wait for a
/// debounced "quiescent" signal or for the very first byte to arrive.
pub struct IdleTracker {
    state: Mutex<State>,
    condvar: Condvar,
}

impl Default for IdleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleTracker {
    /// Construct a tracker with no data received yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                generation: 0,
                fired_generation: 0,
                pending: false,
                ever_received: false,
                closed: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Record that a chunk of PTY data just arrived, resetting the debounce.
    ///
    /// Cheap and non-blocking from the caller's perspective: the actual
    /// `IDLE_DEBOUNCE`-ms sleep happens on a short-lived background thread.
    pub fn notify(self: &Arc<Self>) {
        let gen = {
            let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            state.generation += 1;
            state.ever_received = true;
            state.pending = true;
            state.generation
        };
        self.condvar.notify_all();

        let tracker = Arc::clone(self);
        std::thread::spawn(move || {
            std::thread::sleep(IDLE_DEBOUNCE);
            let mut state = tracker.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            // A later `notify` superseded this timer; let that one fire instead.
            if state.generation != gen {
                return;
            }
            state.pending = false;
            state.fired_generation = gen;
            drop(state);
            tracker.condvar.notify_all();
        });
    }

    /// Wait for the debounce to fire, or for `timeout` to elapse, whichever
    /// comes first. Returns `true` if quiescence was observed, `false` if
    /// `timeout` elapsed first or `close` was called while waiting.
    pub fn await_quiescent(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if state.closed {
            return false;
        }

        if !state.pending {
            // No debounce currently scheduled: resolve after the fallback,
            // capped by the caller's timeout, regardless of outcome, unless
            // `close` wakes us first.
            let wait = timeout.min(INITIAL_IDLE_FALLBACK);
            let (guard, _) = self
                .condvar
                .wait_timeout_while(state, wait, |s| !s.closed)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            return !guard.closed;
        }

        let armed_generation = state.generation;
        let deadline = Instant::now() + timeout;

        loop {
            if state.closed {
                return false;
            }
            if state.fired_generation >= armed_generation {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self
                .condvar
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            state = guard;
            if state.closed {
                return false;
            }
            if result.timed_out() && state.fired_generation < armed_generation {
                return false;
            }
        }
    }

    /// Resolve as soon as the first byte ever arrives; returns `false` if
    /// `timeout` elapses with none received, or `close` is called while
    /// waiting. Immediate success if a byte has already arrived.
    pub fn await_first_data(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let deadline = Instant::now() + timeout;

        while !state.ever_received && !state.closed {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .condvar
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            state = guard;
        }
        state.ever_received && !state.closed
    }

    /// Mark the tracker closed: every waiter currently blocked in
    /// `await_quiescent`/`await_first_data`, and every call made afterward,
    /// returns `false` immediately rather than waiting out its timeout.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.closed = true;
        drop(state);
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_fires_when_no_byte_ever_arrived() {
        let tracker = Arc::new(IdleTracker::new());
        let start = Instant::now();
        let resolved = tracker.await_quiescent(Duration::from_millis(500));
        assert!(resolved);
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn burst_of_notifies_fires_once_after_last() {
        let tracker = Arc::new(IdleTracker::new());
        for _ in 0..5 {
            tracker.notify();
            std::thread::sleep(Duration::from_millis(10));
        }
        let resolved = tracker.await_quiescent(Duration::from_millis(500));
        assert!(resolved);
    }

    #[test]
    fn await_quiescent_times_out_under_continuous_notify() {
        let tracker = Arc::new(IdleTracker::new());
        tracker.notify();
        // Timeout shorter than the debounce: must report failure, not hang.
        let resolved = tracker.await_quiescent(Duration::from_millis(5));
        assert!(!resolved);
    }

    #[test]
    fn await_first_data_resolves_immediately_once_received() {
        let tracker = Arc::new(IdleTracker::new());
        tracker.notify();
        assert!(tracker.await_first_data(Duration::from_millis(10)));
    }

    #[test]
    fn await_first_data_times_out_with_no_data() {
        let tracker = Arc::new(IdleTracker::new());
        assert!(!tracker.await_first_data(Duration::from_millis(20)));
    }

    #[test]
    fn close_wakes_an_outstanding_quiescent_waiter_without_success() {
        let tracker = Arc::new(IdleTracker::new());
        tracker.notify();
        let waiter = Arc::clone(&tracker);
        let handle = std::thread::spawn(move || waiter.await_quiescent(Duration::from_secs(10)));

        std::thread::sleep(Duration::from_millis(10));
        let start = Instant::now();
        tracker.close();

        assert!(!handle.join().expect("waiter thread"));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn close_wakes_an_outstanding_first_data_waiter_without_success() {
        let tracker = Arc::new(IdleTracker::new());
        let waiter = Arc::clone(&tracker);
        let handle = std::thread::spawn(move || waiter.await_first_data(Duration::from_secs(10)));

        std::thread::sleep(Duration::from_millis(10));
        let start = Instant::now();
        tracker.close();

        assert!(!handle.join().expect("waiter thread"));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn await_quiescent_fails_immediately_once_already_closed() {
        let tracker = Arc::new(IdleTracker::new());
        tracker.close();
        assert!(!tracker.await_quiescent(Duration::from_millis(500)));
        assert!(!tracker.await_first_data(Duration::from_millis(500)));
    }
}
