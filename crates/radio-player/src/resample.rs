//! Streaming resample stage.
//!
//! Uses Rubato to convert decoded interleaved `f32` audio from the stream
//! rate to the fixed sink rate. Unlike a file player this runs synchronously
//! inside the sink's write path: input arrives in whatever frame counts the
//! decoder produces, so samples accumulate in a pending buffer and are
//! processed one full chunk at a time.

use anyhow::{Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

/// Streaming sinc resampler with an internal staging buffer.
pub struct StreamResampler {
    inner: Box<dyn Resampler<f32>>,
    channels: usize,
    chunk_frames: usize,
    pending: Vec<f32>,
    out_buf: Vec<f32>,
}

impl StreamResampler {
    /// Create a resampler converting `src_rate` → `dst_rate` for interleaved
    /// audio with `channels` channels.
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize, chunk_frames: usize) -> Result<Self> {
        if src_rate == 0 || dst_rate == 0 || channels == 0 {
            return Err(anyhow!(
                "invalid resampler spec: {src_rate} Hz -> {dst_rate} Hz, {channels} ch"
            ));
        }
        let chunk_frames = chunk_frames.max(1);
        let f_ratio = dst_rate as f64 / src_rate as f64;

        let sinc_len = 128;
        let oversampling_factor = 256;
        let interpolation = SincInterpolationType::Cubic;
        let window = WindowFunction::BlackmanHarris2;
        let f_cutoff = calculate_cutoff(sinc_len, window);

        let params = SincInterpolationParameters {
            sinc_len,
            f_cutoff,
            interpolation,
            oversampling_factor,
            window,
        };

        let inner = Async::<f32>::new_sinc(
            f_ratio,
            1.1,
            &params,
            chunk_frames,
            channels,
            FixedAsync::Input,
        )?;
        let out_buf = vec![0.0f32; (inner.output_frames_max() + 8) * channels];

        Ok(Self {
            inner: Box::new(inner),
            channels,
            chunk_frames,
            pending: Vec::new(),
            out_buf,
        })
    }

    /// Resample `input`, appending produced samples to `out`.
    ///
    /// Input that does not fill a whole processing chunk stays pending until
    /// later calls complete it, so output lags input by less than one chunk.
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) -> Result<()> {
        self.pending.extend_from_slice(input);

        let total_frames = self.pending.len() / self.channels;
        let mut consumed_frames = 0usize;

        while total_frames - consumed_frames >= self.chunk_frames {
            let input_adapter = InterleavedSlice::new(&self.pending, self.channels, total_frames)
                .map_err(|e| anyhow!("interleaved slice (input): {e}"))?;
            let out_capacity_frames = self.out_buf.len() / self.channels;
            let mut output_adapter =
                InterleavedSlice::new_mut(&mut self.out_buf, self.channels, out_capacity_frames)
                    .map_err(|e| anyhow!("interleaved slice (output): {e}"))?;

            let indexing = Indexing {
                input_offset: consumed_frames,
                output_offset: 0,
                active_channels_mask: None,
                partial_len: None,
            };

            let (nbr_in, nbr_out) =
                self.inner
                    .process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))?;
            if nbr_in == 0 {
                break;
            }
            consumed_frames += nbr_in;
            out.extend_from_slice(&self.out_buf[..nbr_out * self.channels]);
        }

        self.pending.drain(..consumed_frames * self.channels);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_rates() {
        assert!(StreamResampler::new(0, 44_100, 2, 1024).is_err());
        assert!(StreamResampler::new(48_000, 0, 2, 1024).is_err());
        assert!(StreamResampler::new(48_000, 44_100, 0, 1024).is_err());
    }

    #[test]
    fn short_input_stays_pending() {
        let mut rs = StreamResampler::new(48_000, 44_100, 2, 1024).unwrap();
        let mut out = Vec::new();
        rs.process(&vec![0.0f32; 2 * 100], &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(rs.pending.len(), 200);
    }

    #[test]
    fn full_chunks_produce_output() {
        let mut rs = StreamResampler::new(48_000, 44_100, 2, 1024).unwrap();
        let mut out = Vec::new();
        // Several chunks of silence through the filter.
        for _ in 0..8 {
            rs.process(&vec![0.0f32; 2 * 1024], &mut out).unwrap();
        }
        assert!(!out.is_empty());
        assert_eq!(out.len() % 2, 0);
        // Pending never grows past one chunk.
        assert!(rs.pending.len() < 2 * 1024);
    }

    #[test]
    fn downsampling_produces_fewer_frames_than_input() {
        let mut rs = StreamResampler::new(48_000, 44_100, 2, 1024).unwrap();
        let mut out = Vec::new();
        let total_in_frames = 1024 * 16;
        rs.process(&vec![0.25f32; 2 * total_in_frames], &mut out)
            .unwrap();
        let out_frames = out.len() / 2;
        assert!(out_frames < total_in_frames);
    }
}
