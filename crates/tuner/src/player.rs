//! Playback controller and the per-chunk streaming bridge.
//!
//! [`RadioPlayer`] owns the session lifecycle: `play` spawns one worker
//! thread bound to the URL, `stop` joins it. The worker runs the whole
//! pipeline synchronously — for every network chunk it passes the
//! pause/stop gate, feeds the decoder, and writes each decoded frame to the
//! blocking sink before the transfer may continue. Every session exit path
//! (stop, end of stream, transport failure, dead device) runs the same
//! teardown, so `playing` is always observable as `false` afterwards.

use std::sync::{Arc, Mutex};
use std::thread;

use radio_player::config::SinkConfig;
use radio_player::decode::{Decode, DecodeStep, StreamDecoder};
use radio_player::format::AudioFormat;
use radio_player::sink::AudioSink;

use crate::control::{ControlState, Gate, PlayerState};
use crate::events::{EndReason, EventHub, PlayerEvent};
use crate::net::{self, FetchOutcome};

/// Controller configuration.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Network read chunk size in bytes.
    pub chunk_bytes: usize,
    /// Fixed sink configuration.
    pub sink: SinkConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: 16 * 1024,
            sink: SinkConfig::default(),
        }
    }
}

/// State shared with the worker thread.
struct Shared {
    control: ControlState,
    events: EventHub,
}

struct Session {
    join: thread::JoinHandle<()>,
}

/// The playback controller: the only surface an embedding layer talks to.
pub struct RadioPlayer {
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
    current_url: Mutex<Option<String>>,
    cfg: PlayerConfig,
}

impl RadioPlayer {
    pub fn new(cfg: PlayerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                control: ControlState::new(),
                events: EventHub::new(),
            }),
            session: Mutex::new(None),
            current_url: Mutex::new(None),
            cfg,
        }
    }

    /// Start streaming `url`. No-op (with a warning) while a session is active.
    pub fn play(&self, url: &str) {
        let mut session = self.session.lock().unwrap();
        if !self.shared.control.begin_session() {
            tracing::warn!(%url, "play ignored; a session is already active");
            return;
        }
        // A worker that ended on its own leaves a finished handle behind.
        if let Some(old) = session.take() {
            let _ = old.join.join();
        }

        *self.current_url.lock().unwrap() = Some(url.to_string());
        self.shared
            .events
            .emit(PlayerEvent::PlayingChanged(true));
        self.shared
            .events
            .emit(PlayerEvent::CurrentUrlChanged(Some(url.to_string())));

        let shared = self.shared.clone();
        let cfg = self.cfg.clone();
        let worker_url = url.to_string();
        let join = thread::spawn(move || stream_worker(shared, cfg, worker_url));
        *session = Some(Session { join });
        tracing::info!(%url, "playback started");
    }

    /// Pause the stream. No-op unless playing.
    pub fn pause(&self) {
        if self.shared.control.pause() {
            self.shared.events.emit(PlayerEvent::PausedChanged(true));
            tracing::info!("playback paused");
        } else {
            tracing::debug!("pause ignored; not playing");
        }
    }

    /// Resume a paused stream. No-op unless paused.
    pub fn resume(&self) {
        if self.shared.control.resume() {
            self.shared.events.emit(PlayerEvent::PausedChanged(false));
            tracing::info!("playback resumed");
        } else {
            tracing::debug!("resume ignored; not paused");
        }
    }

    /// Stop the session, blocking until the worker has fully exited.
    ///
    /// No-op when not playing. The last tuned URL is retained.
    pub fn stop(&self) {
        let mut session = self.session.lock().unwrap();
        if !self.shared.control.begin_stop() {
            if let Some(old) = session.take() {
                let _ = old.join.join();
            }
            tracing::debug!("stop ignored; not playing");
            return;
        }
        if let Some(active) = session.take() {
            let _ = active.join.join();
        }
        self.shared.control.finish_stop();
        drop(session);

        self.shared
            .events
            .emit(PlayerEvent::PlayingChanged(false));
        self.shared.events.emit(PlayerEvent::PausedChanged(false));
        self.shared
            .events
            .emit(PlayerEvent::SessionEnded(EndReason::Stopped));
        tracing::info!("playback stopped");
    }

    pub fn is_playing(&self) -> bool {
        self.shared.control.current() != PlayerState::Idle
    }

    pub fn is_paused(&self) -> bool {
        self.shared.control.current() == PlayerState::Paused
    }

    pub fn current_url(&self) -> Option<String> {
        self.current_url.lock().unwrap().clone()
    }

    /// Subscribe to observable property changes and session outcomes.
    pub fn subscribe(&self) -> crossbeam_channel::Receiver<PlayerEvent> {
        self.shared.events.subscribe()
    }
}

impl Drop for RadioPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-session worker: open the sink, then bridge network → decode → sink.
fn stream_worker(shared: Arc<Shared>, cfg: PlayerConfig, url: String) {
    tracing::info!(%url, "starting stream");

    let cancel = shared.control.cancel_token();
    let mut sink = match AudioSink::open(cfg.sink, cancel) {
        Ok(sink) => sink,
        Err(e) => {
            tracing::error!("audio device unavailable: {e:#}");
            end_session(&shared, EndReason::DeviceError);
            return;
        }
    };

    let mut decoder = StreamDecoder::new();
    let result = net::fetch_stream(&url, cfg.chunk_bytes, |chunk| {
        match shared.control.gate() {
            Gate::Abort => return 0,
            Gate::Continue => {}
        }
        decoder.feed(chunk);
        drain_decoded(&mut decoder, |pcm, format| {
            if let Err(e) = sink.write(pcm, format) {
                tracing::warn!("sink write error: {e:#}");
            }
        });
        chunk.len()
    });

    match result {
        Ok(FetchOutcome::Aborted) => {
            // Stop path: discard buffered audio; `stop()` finishes the
            // transition and emits the events after the join.
            sink.close(false);
        }
        Ok(FetchOutcome::Finished) => {
            sink.close(true);
            tracing::info!(
                skipped_frames = decoder.skipped_frames(),
                "stream ended by remote"
            );
            end_session(&shared, EndReason::Finished);
        }
        Err(e) => {
            sink.close(false);
            tracing::error!("stream transfer failed: {e:#}");
            end_session(&shared, EndReason::NetworkError);
        }
    }
}

/// Worker-side teardown for sessions that end without a `stop` call.
fn end_session(shared: &Shared, reason: EndReason) {
    if shared.control.end_of_session() {
        shared.events.emit(PlayerEvent::PlayingChanged(false));
        shared.events.emit(PlayerEvent::PausedChanged(false));
        shared.events.emit(PlayerEvent::SessionEnded(reason));
    }
}

/// Drain every decodable frame out of the backlog into the sink.
///
/// Returns the number of frames written. Skipped (malformed) frames keep the
/// drain going; `NeedMore` hands control back to the transfer.
fn drain_decoded(
    decoder: &mut impl Decode,
    mut write: impl FnMut(&[i16], &AudioFormat),
) -> usize {
    let mut frames = 0;
    loop {
        match decoder.decode_next() {
            DecodeStep::Frame => {
                // Format is re-read per frame; it may renegotiate mid-stream.
                if let Some(format) = decoder.format() {
                    write(decoder.pcm(), &format);
                    frames += 1;
                }
            }
            DecodeStep::Skipped => continue,
            DecodeStep::NeedMore => break,
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedDecoder {
        steps: Vec<DecodeStep>,
        pcm: Vec<i16>,
        format: AudioFormat,
        fed: usize,
    }

    impl ScriptedDecoder {
        fn new(steps: Vec<DecodeStep>) -> Self {
            Self {
                steps,
                pcm: vec![0i16; 2304],
                format: AudioFormat::new(44_100, 2),
                fed: 0,
            }
        }
    }

    impl Decode for ScriptedDecoder {
        fn feed(&mut self, bytes: &[u8]) {
            self.fed += bytes.len();
        }

        fn decode_next(&mut self) -> DecodeStep {
            if self.steps.is_empty() {
                DecodeStep::NeedMore
            } else {
                self.steps.remove(0)
            }
        }

        fn pcm(&self) -> &[i16] {
            &self.pcm
        }

        fn format(&self) -> Option<AudioFormat> {
            Some(self.format)
        }
    }

    #[test]
    fn drain_writes_one_frame_per_decoded_frame() {
        let mut decoder = ScriptedDecoder::new(vec![
            DecodeStep::Frame,
            DecodeStep::Frame,
            DecodeStep::NeedMore,
        ]);
        let mut writes = 0;
        let frames = drain_decoded(&mut decoder, |pcm, format| {
            writes += 1;
            assert_eq!(pcm.len(), 2304);
            assert_eq!(format.channels, 2);
        });
        assert_eq!(frames, 2);
        assert_eq!(writes, 2);
    }

    #[test]
    fn drain_continues_past_skipped_frames() {
        let mut decoder = ScriptedDecoder::new(vec![
            DecodeStep::Frame,
            DecodeStep::Skipped,
            DecodeStep::Frame,
            DecodeStep::NeedMore,
        ]);
        let frames = drain_decoded(&mut decoder, |_, _| {});
        assert_eq!(frames, 2);
    }

    #[test]
    fn drain_stops_at_need_more() {
        let mut decoder = ScriptedDecoder::new(vec![DecodeStep::NeedMore, DecodeStep::Frame]);
        let frames = drain_decoded(&mut decoder, |_, _| {});
        assert_eq!(frames, 0);
    }

    #[test]
    fn default_config_has_sane_values() {
        let cfg = PlayerConfig::default();
        assert_eq!(cfg.chunk_bytes, 16 * 1024);
        assert_eq!(cfg.sink.sample_rate, 44_100);
    }

    #[test]
    fn controls_are_noops_when_idle() {
        let player = RadioPlayer::new(PlayerConfig::default());
        let events = player.subscribe();

        player.pause();
        player.resume();
        player.stop();

        assert!(!player.is_playing());
        assert!(!player.is_paused());
        assert!(player.current_url().is_none());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn play_emits_state_changes_and_stop_recovers() {
        let player = RadioPlayer::new(PlayerConfig::default());
        let events = player.subscribe();

        // The worker will fail fast in a headless environment; the control
        // surface still has to behave.
        player.play("http://127.0.0.1:9/stream.mp3");
        assert_eq!(
            events.recv().unwrap(),
            PlayerEvent::PlayingChanged(true)
        );
        assert_eq!(
            events.recv().unwrap(),
            PlayerEvent::CurrentUrlChanged(Some("http://127.0.0.1:9/stream.mp3".to_string()))
        );
        assert_eq!(
            player.current_url().as_deref(),
            Some("http://127.0.0.1:9/stream.mp3")
        );

        player.stop();
        assert!(!player.is_playing());
        // The URL of the last station is retained after stop.
        assert!(player.current_url().is_some());
    }
}
