//! Change notifications for the observable player properties.

use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender};

/// Why a playback session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// The remote closed the stream.
    Finished,
    /// Playback was explicitly stopped.
    Stopped,
    /// The transfer failed.
    NetworkError,
    /// The output device could not be opened or started.
    DeviceError,
}

/// Events emitted once per observable state change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    PlayingChanged(bool),
    PausedChanged(bool),
    CurrentUrlChanged(Option<String>),
    SessionEnded(EndReason),
}

/// Fan-out hub delivering events to any number of subscribers.
///
/// Disconnected subscribers are pruned on the next emit.
pub(crate) struct EventHub {
    subscribers: Mutex<Vec<Sender<PlayerEvent>>>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: PlayerEvent) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
