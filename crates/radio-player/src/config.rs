/// Fixed output configuration plus tuning knobs for the audio sink.
///
/// The device side of the sink is opened once per session with these values
/// and never reconfigured; the stream side adapts to whatever format the
/// decoder reports (see `sink::AudioSink::write`).
#[derive(Clone, Debug)]
pub struct SinkConfig {
    /// Output sample rate the device stream is opened with.
    pub sample_rate: u32,
    /// Output channel count the device stream is opened with.
    pub channels: usize,
    /// Requested device buffer size in frames (clamped to what the device supports).
    pub buffer_frames: u32,
    /// Target buffering between the worker and the output callback.
    pub queue_seconds: f32,
    /// Max frames pulled per output callback refill.
    pub refill_max_frames: usize,
    /// Resampler input chunk size in frames.
    pub chunk_frames: usize,
}

impl Default for SinkConfig {
    /// Defaults matching the fixed output contract: 44.1 kHz stereo, 1024-frame device buffer.
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            buffer_frames: 1024,
            queue_seconds: 2.0,
            refill_max_frames: 4096,
            chunk_frames: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sink_config_is_fixed_cd_stereo() {
        let cfg = SinkConfig::default();
        assert_eq!(cfg.sample_rate, 44_100);
        assert_eq!(cfg.channels, 2);
        assert_eq!(cfg.buffer_frames, 1024);
    }
}
