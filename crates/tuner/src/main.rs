//! tuner — a small CLI that streams an internet radio station to the
//! default audio output device.
//!
//! ## Pipeline
//! 1. **Fetch**: a worker thread streams the URL over HTTP(S), chunk by chunk.
//! 2. **Decode**: each chunk feeds an incremental MPEG decoder (Symphonia).
//! 3. **Output**: decoded frames are written to a blocking CPAL sink opened
//!    at a fixed 44.1 kHz stereo configuration, resampling when the stream
//!    rate differs.
//!
//! Control: `pause` / `resume` / `stop` on stdin, Ctrl-C to quit.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use radio_player::config::SinkConfig;
use tuner::cli;
use tuner::events::PlayerEvent;
use tuner::player::{PlayerConfig, RadioPlayer};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tuner=info")),
        )
        .init();

    let player = Arc::new(RadioPlayer::new(PlayerConfig {
        chunk_bytes: args.chunk_bytes,
        sink: SinkConfig {
            queue_seconds: args.buffer_seconds,
            chunk_frames: args.chunk_frames,
            ..SinkConfig::default()
        },
    }));
    let events = player.subscribe();

    let player_for_signal = player.clone();
    let _ = ctrlc::set_handler(move || {
        player_for_signal.stop();
        std::process::exit(130);
    });

    player.play(&args.url);
    spawn_command_reader(player.clone());

    for event in events.iter() {
        match event {
            PlayerEvent::SessionEnded(reason) => {
                tracing::info!(reason = ?reason, "session ended");
                break;
            }
            PlayerEvent::PausedChanged(paused) => tracing::info!(paused, "paused changed"),
            PlayerEvent::PlayingChanged(playing) => tracing::debug!(playing, "playing changed"),
            PlayerEvent::CurrentUrlChanged(url) => {
                tracing::debug!(url = url.as_deref().unwrap_or(""), "url changed")
            }
        }
    }

    player.stop();
    Ok(())
}

/// Line-based control surface on stdin.
fn spawn_command_reader(player: Arc<RadioPlayer>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "pause" | "p" => player.pause(),
                "resume" | "r" => player.resume(),
                "stop" | "q" | "quit" => {
                    player.stop();
                    break;
                }
                "" => {}
                other => tracing::warn!(command = other, "unknown command (pause|resume|stop)"),
            }
        }
    });
}
