//! Playback stage (CPAL output stream).
//!
//! Builds the CPAL output stream and provides the real-time audio callback.
//! The callback refills a small local buffer from the shared queue without
//! blocking, converts to the device sample format, and fills underruns with
//! silence.

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::queue::OutputQueue;

/// Build a CPAL output stream that plays interleaved `f32` audio from `queue`.
///
/// The queue must carry the same channel count as `config`; the sink opens
/// both at the fixed output layout so no channel mapping happens here.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<OutputQueue>,
    refill_max_frames: usize,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, refill_max_frames),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, refill_max_frames),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, refill_max_frames),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, refill_max_frames),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

/// Local refill buffer for the CPAL callback.
///
/// A small Vec fetched from the queue in bursts keeps the callback from
/// locking the queue once per sample.
struct CallbackState {
    pos: usize,
    src: Vec<f32>,
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<OutputQueue>,
    refill_max_frames: usize,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let refill_max_frames = refill_max_frames.max(1);
    let queue_cb = queue.clone();
    let state = Arc::new(Mutex::new(CallbackState {
        pos: 0,
        src: Vec::new(),
    }));

    let err_fn = |err| tracing::warn!("stream error: {err}");

    let state_cb = state.clone();
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let mut st = state_cb.lock().unwrap();

            let frames = data.len() / channels;
            for frame in 0..frames {
                if st.pos >= st.src.len() {
                    st.pos = 0;
                    st.src.clear();
                    match queue_cb.pop_frames(refill_max_frames) {
                        Some(v) => st.src = v,
                        None => {
                            // Underrun (or pause upstream): emit silence.
                            for sample in &mut data[frame * channels..] {
                                *sample = <T as cpal::Sample>::from_sample::<f32>(0.0);
                            }
                            return;
                        }
                    }
                }
                for ch in 0..channels {
                    data[frame * channels + ch] =
                        <T as cpal::Sample>::from_sample::<f32>(st.src[st.pos + ch]);
                }
                st.pos += channels;
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
