//! Audio sink: the fixed-format output device behind a blocking write.
//!
//! Opened once per session with the fixed configuration from [`SinkConfig`];
//! the device side never changes afterwards. The stream side adapts inside
//! [`AudioSink::write`]: the source frame count is computed from the byte
//! length with the *stream's* channel count, samples are mapped to the sink
//! channel layout, resampled when the stream rate differs from the sink
//! rate, and pushed into the bounded queue — blocking until the device-paced
//! callback makes room.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::config::SinkConfig;
use crate::device;
use crate::format::AudioFormat;
use crate::playback;
use crate::queue::{OutputQueue, calc_capacity_samples};
use crate::resample::StreamResampler;

pub struct AudioSink {
    cfg: SinkConfig,
    queue: Arc<OutputQueue>,
    stream: Option<cpal::Stream>,
    cancel: Arc<AtomicBool>,
    stream_format: Option<AudioFormat>,
    resampler: Option<StreamResampler>,
    staged: Vec<f32>,
    resampled: Vec<f32>,
}

impl AudioSink {
    /// Open the default output device with the fixed sink configuration and
    /// start the output stream.
    ///
    /// Failure here is session-fatal; the caller tears the session down.
    pub fn open(cfg: SinkConfig, cancel: Arc<AtomicBool>) -> Result<Self> {
        let out = device::open_default_output(&cfg).context("open output device")?;
        let capacity = calc_capacity_samples(cfg.sample_rate, cfg.channels, cfg.queue_seconds);
        let queue = Arc::new(OutputQueue::new(cfg.channels, capacity));

        let stream = playback::build_output_stream(
            &out.device,
            &out.stream_config,
            out.sample_format,
            &queue,
            cfg.refill_max_frames,
        )
        .context("build output stream")?;
        stream.play().context("start output stream")?;

        let device_name = out
            .device
            .description()
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        tracing::info!(
            device = %device_name,
            rate_hz = cfg.sample_rate,
            channels = cfg.channels,
            buffer_size = ?out.stream_config.buffer_size,
            "audio sink opened"
        );

        Ok(Self {
            cfg,
            queue,
            stream: Some(stream),
            cancel,
            stream_format: None,
            resampler: None,
            staged: Vec::new(),
            resampled: Vec::new(),
        })
    }

    /// Write one decoded frame of interleaved 16-bit PCM.
    ///
    /// Blocks until the device accepts the samples (bounded queue). A raised
    /// cancel flag abandons the write so `stop` never waits on the device.
    pub fn write(&mut self, pcm: &[i16], format: &AudioFormat) -> Result<()> {
        let byte_len = pcm.len() * format.encoding.bytes_per_sample();
        let frames = format.frame_count(byte_len);
        if frames == 0 {
            return Ok(());
        }

        if self.stream_format != Some(*format) {
            self.reconfigure(format)?;
        }

        stage_samples(pcm, format.channels, self.cfg.channels, &mut self.staged);

        let samples: &[f32] = match self.resampler.as_mut() {
            Some(rs) => {
                self.resampled.clear();
                rs.process(&self.staged, &mut self.resampled)?;
                &self.resampled
            }
            None => &self.staged,
        };
        if samples.is_empty() {
            return Ok(());
        }

        if !self.queue.push_blocking(samples, &self.cancel) {
            tracing::debug!("sink write abandoned during shutdown");
        }
        Ok(())
    }

    /// Tear the sink down. Idempotent; runs on every session exit path.
    ///
    /// With `drain` set, buffered audio plays out first (natural end of
    /// stream); without it the buffer is discarded (stop or error).
    pub fn close(&mut self, drain: bool) {
        if let Some(stream) = self.stream.take() {
            self.queue.close();
            if drain {
                self.queue.wait_drained(&self.cancel);
            }
            drop(stream);
            tracing::debug!(drained = drain, "audio sink closed");
        }
    }

    /// Track the stream format, rebuilding the resample stage when it moves
    /// away from (or back to) the fixed sink rate.
    fn reconfigure(&mut self, format: &AudioFormat) -> Result<()> {
        match self.stream_format {
            Some(prev) => tracing::info!(
                from_rate_hz = prev.sample_rate,
                from_channels = prev.channels,
                rate_hz = format.sample_rate,
                channels = format.channels,
                "stream format renegotiated"
            ),
            None => tracing::info!(
                rate_hz = format.sample_rate,
                channels = format.channels,
                "stream format detected"
            ),
        }

        self.resampler = if format.sample_rate != self.cfg.sample_rate {
            Some(StreamResampler::new(
                format.sample_rate,
                self.cfg.sample_rate,
                self.cfg.channels,
                self.cfg.chunk_frames,
            )?)
        } else {
            None
        };
        self.stream_format = Some(*format);
        Ok(())
    }
}

impl Drop for AudioSink {
    fn drop(&mut self) {
        self.close(false);
    }
}

/// Map interleaved 16-bit PCM to the sink channel layout as `f32`.
///
/// Mono duplicates into both sink channels; matching layouts pass through;
/// anything wider clamps to the available source channels.
fn stage_samples(pcm: &[i16], src_channels: usize, dst_channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if src_channels == 0 || dst_channels == 0 {
        return;
    }
    let frames = pcm.len() / src_channels;
    out.reserve(frames * dst_channels);

    for frame in 0..frames {
        let base = frame * src_channels;
        for ch in 0..dst_channels {
            let src_ch = if src_channels == 1 { 0 } else { ch.min(src_channels - 1) };
            out.push(sample_to_f32(pcm[base + src_ch]));
        }
    }
}

fn sample_to_f32(s: i16) -> f32 {
    s as f32 / 32_768.0
}
