//! Session control state shared by the public API and the worker thread.
//!
//! The lifecycle is one tagged value under one mutex, so transitions like
//! "stop while paused" are race-free, and a condvar lets the worker sleep
//! through a pause at zero CPU cost. A derived atomic cancel token — raised
//! only on entry to `Stopping` — is handed to the pipeline so its blocking
//! waits stay responsive without taking the control lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Lifecycle of the single playback session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PlayerState {
    Idle,
    Playing,
    Paused,
    Stopping,
}

/// Verdict of the worker's per-chunk gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Gate {
    Continue,
    Abort,
}

pub(crate) struct ControlState {
    state: Mutex<PlayerState>,
    cv: Condvar,
    cancel: Arc<AtomicBool>,
}

impl ControlState {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(PlayerState::Idle),
            cv: Condvar::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn current(&self) -> PlayerState {
        *self.state.lock().unwrap()
    }

    /// Cancel token shared with the pipeline's blocking waits.
    pub(crate) fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// `Idle → Playing`. Clears the cancel token for the new session.
    pub(crate) fn begin_session(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        if *st != PlayerState::Idle {
            return false;
        }
        self.cancel.store(false, Ordering::Relaxed);
        *st = PlayerState::Playing;
        true
    }

    /// `Playing → Paused`.
    pub(crate) fn pause(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        if *st != PlayerState::Playing {
            return false;
        }
        *st = PlayerState::Paused;
        true
    }

    /// `Paused → Playing`; wakes the worker's gate.
    pub(crate) fn resume(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        if *st != PlayerState::Paused {
            return false;
        }
        *st = PlayerState::Playing;
        drop(st);
        self.cv.notify_all();
        true
    }

    /// `Playing | Paused → Stopping`; raises the cancel token and wakes the
    /// gate so the worker aborts at the next chunk boundary.
    pub(crate) fn begin_stop(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        if *st != PlayerState::Playing && *st != PlayerState::Paused {
            return false;
        }
        self.cancel.store(true, Ordering::Relaxed);
        *st = PlayerState::Stopping;
        drop(st);
        self.cv.notify_all();
        true
    }

    /// `Stopping → Idle`, after the worker has been joined.
    pub(crate) fn finish_stop(&self) {
        let mut st = self.state.lock().unwrap();
        *st = PlayerState::Idle;
    }

    /// Worker-side end of session (natural end or fatal error).
    ///
    /// Returns `true` when the worker owns the teardown; `false` when a
    /// concurrent `stop` is in flight and will finish the transition itself.
    pub(crate) fn end_of_session(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        if *st == PlayerState::Stopping {
            return false;
        }
        *st = PlayerState::Idle;
        true
    }

    /// Per-chunk gate: sleeps while paused, aborts once stopping.
    pub(crate) fn gate(&self) -> Gate {
        let mut st = self.state.lock().unwrap();
        while *st == PlayerState::Paused {
            st = self.cv.wait(st).unwrap();
        }
        if *st == PlayerState::Stopping {
            Gate::Abort
        } else {
            Gate::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn begin_session_only_from_idle() {
        let c = ControlState::new();
        assert!(c.begin_session());
        assert!(!c.begin_session());
        assert_eq!(c.current(), PlayerState::Playing);
    }

    #[test]
    fn pause_resume_cycle() {
        let c = ControlState::new();
        assert!(!c.pause());
        assert!(c.begin_session());
        assert!(c.pause());
        assert_eq!(c.current(), PlayerState::Paused);
        assert!(!c.pause());
        assert!(c.resume());
        assert_eq!(c.current(), PlayerState::Playing);
        assert!(!c.resume());
    }

    #[test]
    fn stop_works_from_playing_and_paused() {
        let c = ControlState::new();
        assert!(!c.begin_stop());
        assert!(c.begin_session());
        assert!(c.begin_stop());
        assert_eq!(c.current(), PlayerState::Stopping);
        c.finish_stop();
        assert_eq!(c.current(), PlayerState::Idle);

        assert!(c.begin_session());
        assert!(c.pause());
        assert!(c.begin_stop());
        assert_eq!(c.current(), PlayerState::Stopping);
    }

    #[test]
    fn cancel_token_follows_stop_and_new_session() {
        let c = ControlState::new();
        let cancel = c.cancel_token();
        assert!(c.begin_session());
        assert!(!cancel.load(Ordering::Relaxed));
        assert!(c.begin_stop());
        assert!(cancel.load(Ordering::Relaxed));
        c.finish_stop();
        assert!(c.begin_session());
        assert!(!cancel.load(Ordering::Relaxed));
    }

    #[test]
    fn gate_continues_while_playing() {
        let c = ControlState::new();
        assert!(c.begin_session());
        assert_eq!(c.gate(), Gate::Continue);
    }

    #[test]
    fn gate_aborts_when_stopping() {
        let c = ControlState::new();
        assert!(c.begin_session());
        assert!(c.begin_stop());
        assert_eq!(c.gate(), Gate::Abort);
    }

    #[test]
    fn gate_blocks_on_pause_until_resume() {
        let c = Arc::new(ControlState::new());
        assert!(c.begin_session());
        assert!(c.pause());

        let c_gate = c.clone();
        let handle = thread::spawn(move || c_gate.gate());

        thread::sleep(Duration::from_millis(20));
        assert!(c.resume());
        assert_eq!(handle.join().unwrap(), Gate::Continue);
    }

    #[test]
    fn gate_wakes_into_abort_on_stop_while_paused() {
        let c = Arc::new(ControlState::new());
        assert!(c.begin_session());
        assert!(c.pause());

        let c_gate = c.clone();
        let handle = thread::spawn(move || c_gate.gate());

        thread::sleep(Duration::from_millis(20));
        assert!(c.begin_stop());
        assert_eq!(handle.join().unwrap(), Gate::Abort);
    }

    #[test]
    fn worker_end_defers_to_concurrent_stop() {
        let c = ControlState::new();
        assert!(c.begin_session());
        assert!(c.begin_stop());
        assert!(!c.end_of_session());
        assert_eq!(c.current(), PlayerState::Stopping);
    }

    #[test]
    fn worker_end_owns_teardown_otherwise() {
        let c = ControlState::new();
        assert!(c.begin_session());
        assert!(c.end_of_session());
        assert_eq!(c.current(), PlayerState::Idle);
    }
}
