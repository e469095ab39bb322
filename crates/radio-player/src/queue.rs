//! Bounded queue of interleaved samples between the worker and the device.
//!
//! The worker-side push blocks while the queue is full, which is what makes
//! the sink a device-paced blocking write: the CPAL callback drains at the
//! device clock and wakes the producer as room appears. `close()` makes
//! shutdown deterministic; blocked pushes also watch a cancel flag so `stop`
//! is never gated on the device draining.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// How often a blocked producer re-checks the cancel flag.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Bounded multi-thread queue of interleaved `f32` samples.
pub struct OutputQueue {
    channels: usize,
    inner: Mutex<Inner>,
    cv: Condvar,
    max_samples: usize,
}

struct Inner {
    queue: VecDeque<f32>,
    closed: bool,
}

/// Queue capacity in samples for `seconds` of audio at `(rate, channels)`.
pub fn calc_capacity_samples(rate_hz: u32, channels: usize, seconds: f32) -> usize {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        2.0
    };
    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(channels)
}

impl OutputQueue {
    pub fn new(channels: usize, max_samples: usize) -> Self {
        Self {
            channels,
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
            max_samples: max_samples.max(channels),
        }
    }

    /// Buffered frames right now (snapshot).
    pub fn len_frames(&self) -> usize {
        let g = self.inner.lock().unwrap();
        g.queue.len() / self.channels
    }

    /// Mark the queue closed and wake every waiter. Idempotent.
    ///
    /// Buffered samples remain poppable until drained; pushes stop accepting.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Push interleaved samples, blocking while the queue is full.
    ///
    /// Returns `false` if the queue was closed or `cancel` was raised before
    /// everything was accepted; remaining samples are dropped in that case.
    pub fn push_blocking(&self, samples: &[f32], cancel: &AtomicBool) -> bool {
        let mut offset = 0;

        while offset < samples.len() {
            let mut g = self.inner.lock().unwrap();

            while g.queue.len() >= self.max_samples && !g.closed {
                if cancel.load(Ordering::Relaxed) {
                    return false;
                }
                let (ng, _timeout) = self.cv.wait_timeout(g, CANCEL_POLL).unwrap();
                g = ng;
            }
            if g.closed || cancel.load(Ordering::Relaxed) {
                return false;
            }

            while offset < samples.len() && g.queue.len() < self.max_samples {
                g.queue.push_back(samples[offset]);
                offset += 1;
            }

            drop(g);
            self.cv.notify_all();
        }

        true
    }

    /// Pop up to `max_frames` whole frames without blocking.
    ///
    /// Returns `None` when nothing is buffered; callers treat that as an
    /// underrun and emit silence.
    pub fn pop_frames(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut g = self.inner.lock().unwrap();

        let available_frames = g.queue.len() / self.channels;
        let take_samples = available_frames.min(max_frames) * self.channels;
        if take_samples == 0 {
            return None;
        }

        let out: Vec<f32> = g.queue.drain(..take_samples).collect();
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    /// Block until the queue is closed and empty, or `cancel` is raised.
    ///
    /// Returns `true` if the queue drained normally.
    pub fn wait_drained(&self, cancel: &AtomicBool) -> bool {
        let mut g = self.inner.lock().unwrap();
        loop {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            if g.closed && g.queue.is_empty() {
                return true;
            }
            let (ng, _timeout) = self.cv.wait_timeout(g, CANCEL_POLL).unwrap();
            g = ng;
        }
    }
}
