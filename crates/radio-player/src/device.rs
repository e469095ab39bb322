//! Default output device selection for the fixed sink configuration.
//!
//! The sink always opens the host default device at the configured rate and
//! channel count; this module only validates that the device supports them,
//! ranks candidate sample formats, and clamps the requested buffer size into
//! the supported range.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

use crate::config::SinkConfig;

/// A device stream description resolved from the fixed sink configuration.
pub struct OpenOutput {
    pub device: cpal::Device,
    pub stream_config: cpal::StreamConfig,
    pub sample_format: cpal::SampleFormat,
}

/// Resolve the default output device against the fixed sink configuration.
///
/// Fails when the host has no default output device or the device cannot run
/// at the configured rate/channel count; that failure is session-fatal.
pub fn open_default_output(cfg: &SinkConfig) -> Result<OpenOutput> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))?;

    let ranges: Vec<cpal::SupportedStreamConfigRange> = device
        .supported_output_configs()
        .context("No supported output configs")?
        .collect();

    let mut best: Option<cpal::SupportedStreamConfigRange> = None;
    for range in ranges {
        if range.channels() as usize != cfg.channels {
            continue;
        }
        if cfg.sample_rate < range.min_sample_rate() || cfg.sample_rate > range.max_sample_rate() {
            continue;
        }
        let replace = match &best {
            None => true,
            Some(b) => {
                sample_format_rank(range.sample_format()) < sample_format_rank(b.sample_format())
            }
        };
        if replace {
            best = Some(range);
        }
    }

    let range = best.ok_or_else(|| {
        anyhow!(
            "Output device does not support {} ch @ {} Hz",
            cfg.channels,
            cfg.sample_rate
        )
    })?;

    let supported = range.with_sample_rate(cfg.sample_rate);
    let sample_format = supported.sample_format();
    let buffer_size = pick_buffer_size(&supported, cfg.buffer_frames);
    let mut stream_config: cpal::StreamConfig = supported.into();
    stream_config.buffer_size = buffer_size;

    Ok(OpenOutput {
        device,
        stream_config,
        sample_format,
    })
}

/// Clamp the requested fixed buffer size into what the device advertises.
///
/// Falls back to the device default when the supported range is unknown.
fn pick_buffer_size(
    config: &cpal::SupportedStreamConfig,
    requested_frames: u32,
) -> cpal::BufferSize {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            cpal::BufferSize::Fixed(requested_frames.clamp(*min, *max))
        }
        cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Default,
    }
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_format_rank_prefers_f32() {
        assert!(sample_format_rank(cpal::SampleFormat::F32) < sample_format_rank(cpal::SampleFormat::I16));
        assert!(sample_format_rank(cpal::SampleFormat::I16) < sample_format_rank(cpal::SampleFormat::U16));
    }
}
