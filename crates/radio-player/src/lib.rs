//! Streaming playback pipeline for a single live audio stream.
//!
//! Stages: push-style MPEG decode ([`decode::StreamDecoder`]) → channel
//! mapping + resample + bounded queue ([`sink::AudioSink`]) → CPAL output
//! callback ([`playback`]).

pub mod config;
pub mod decode;
pub mod device;
pub mod format;
pub mod playback;
pub mod queue;
pub mod resample;
pub mod sink;

mod mpa;
