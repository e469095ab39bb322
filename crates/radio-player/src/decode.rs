//! Push-style streaming MPEG decode stage.
//!
//! Uses Symphonia's MP3 codec behind an incremental interface: compressed
//! bytes are [`Decode::feed`]-ed in whatever chunks the transport delivers,
//! and [`Decode::decode_next`] emits one frame of interleaved 16-bit PCM at a
//! time until the backlog runs dry. The output format is re-read after every
//! frame because a station may renegotiate it mid-stream.

use anyhow::Result;
use symphonia::core::audio::{Channels, SampleBuffer};
use symphonia::core::codecs::{CODEC_TYPE_MP3, CodecParameters, Decoder, DecoderOptions};
use symphonia::core::formats::Packet;

use crate::format::AudioFormat;
use crate::mpa;

/// Outcome of one [`Decode::decode_next`] call.
#[derive(Debug)]
pub enum DecodeStep {
    /// One frame was decoded; read it via `pcm()` and re-read `format()`.
    Frame,
    /// The backlog holds no complete frame; feed more bytes.
    NeedMore,
    /// A malformed frame was dropped; keep draining.
    Skipped,
}

/// Incremental decoder interface used by the per-chunk bridge.
pub trait Decode {
    /// Append compressed bytes to the decode backlog.
    fn feed(&mut self, bytes: &[u8]);

    /// Try to decode the next frame from the backlog.
    fn decode_next(&mut self) -> DecodeStep;

    /// Interleaved PCM of the most recent frame, valid until the next
    /// `decode_next` call.
    fn pcm(&self) -> &[i16];

    /// Format of the most recent frame; `None` until a frame has decoded.
    fn format(&self) -> Option<AudioFormat>;
}

/// Stateful MP3 stream decoder over Symphonia's codec layer.
pub struct StreamDecoder {
    backlog: Vec<u8>,
    decoder: Option<Box<dyn Decoder>>,
    pcm: Vec<i16>,
    format: Option<AudioFormat>,
    skipped_frames: u64,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            backlog: Vec::new(),
            decoder: None,
            pcm: Vec::new(),
            format: None,
            skipped_frames: 0,
        }
    }

    /// Number of malformed frames dropped so far this session.
    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames
    }

    /// Bytes currently buffered waiting for a complete frame.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    fn ensure_decoder(&mut self, header: &mpa::FrameHeader) -> Result<&mut Box<dyn Decoder>> {
        if self.decoder.is_none() {
            let channels = if header.channels == 1 {
                Channels::FRONT_LEFT
            } else {
                Channels::FRONT_LEFT | Channels::FRONT_RIGHT
            };
            let mut params = CodecParameters::new();
            params
                .for_codec(CODEC_TYPE_MP3)
                .with_sample_rate(header.sample_rate)
                .with_channels(channels);
            let decoder =
                symphonia::default::get_codecs().make(&params, &DecoderOptions::default())?;
            tracing::info!(
                sample_rate = header.sample_rate,
                channels = header.channels,
                bitrate_kbps = header.bitrate_kbps,
                "stream decoder initialized"
            );
            self.decoder = Some(decoder);
        }
        Ok(self.decoder.as_mut().unwrap())
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decode for StreamDecoder {
    fn feed(&mut self, bytes: &[u8]) {
        self.backlog.extend_from_slice(bytes);
    }

    fn decode_next(&mut self) -> DecodeStep {
        let (start, header) = match mpa::scan(&self.backlog) {
            mpa::Scan::NeedMore { keep_from } => {
                if keep_from > 0 {
                    self.backlog.drain(..keep_from);
                }
                return DecodeStep::NeedMore;
            }
            mpa::Scan::Frame { start, header } => (start, header),
        };

        if start > 0 {
            tracing::debug!(discarded = start, "resynced to frame boundary");
        }
        let frame: Vec<u8> = self.backlog[start..start + header.frame_len].to_vec();
        self.backlog.drain(..start + header.frame_len);

        let decoder = match self.ensure_decoder(&header) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!("decoder init error: {e:#}");
                self.skipped_frames += 1;
                return DecodeStep::Skipped;
            }
        };

        let packet = Packet::new_from_slice(0, 0, 0, &frame);
        let decoded = decoder.decode(&packet).map(|audio| {
            let spec = *audio.spec();
            let mut sample_buf = SampleBuffer::<i16>::new(audio.frames() as u64, spec);
            sample_buf.copy_interleaved_ref(audio);
            (spec, sample_buf)
        });

        match decoded {
            Ok((spec, sample_buf)) => {
                self.pcm.clear();
                self.pcm.extend_from_slice(sample_buf.samples());
                self.format = Some(AudioFormat::new(spec.rate, spec.channels.count()));
                DecodeStep::Frame
            }
            Err(e) => {
                // One bad frame must not end the session.
                tracing::warn!("frame decode error: {e}");
                self.skipped_frames += 1;
                DecodeStep::Skipped
            }
        }
    }

    fn pcm(&self) -> &[i16] {
        &self.pcm
    }

    fn format(&self) -> Option<AudioFormat> {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // MPEG-1 Layer III, 128 kbps, 44.1 kHz, stereo; 417 bytes.
    fn silent_frame() -> Vec<u8> {
        let mut f = vec![0u8; 417];
        f[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        f
    }

    #[test]
    fn empty_decoder_needs_more() {
        let mut dec = StreamDecoder::new();
        assert!(matches!(dec.decode_next(), DecodeStep::NeedMore));
        assert!(dec.format().is_none());
        assert!(dec.pcm().is_empty());
    }

    #[test]
    fn garbage_is_discarded_while_waiting() {
        let mut dec = StreamDecoder::new();
        dec.feed(&[0u8; 256]);
        assert!(matches!(dec.decode_next(), DecodeStep::NeedMore));
        // Only a potential partial sync is kept.
        assert!(dec.backlog_len() <= 3);
    }

    #[test]
    fn partial_frame_waits_without_discarding() {
        let mut dec = StreamDecoder::new();
        dec.feed(&silent_frame()[..200]);
        assert!(matches!(dec.decode_next(), DecodeStep::NeedMore));
        assert_eq!(dec.backlog_len(), 200);
    }

    #[test]
    fn confirmed_frame_is_consumed() {
        let mut dec = StreamDecoder::new();
        dec.feed(&silent_frame());
        dec.feed(&silent_frame());
        // The second frame confirms the first; the first must leave the
        // backlog whether it decodes cleanly or gets dropped as malformed.
        let step = dec.decode_next();
        assert!(matches!(step, DecodeStep::Frame | DecodeStep::Skipped));
        assert_eq!(dec.backlog_len(), 417);
        // The remaining unconfirmed frame stays buffered.
        assert!(matches!(dec.decode_next(), DecodeStep::NeedMore));
        assert_eq!(dec.backlog_len(), 417);
    }

    #[test]
    fn decoding_continues_past_bad_bytes() {
        let mut dec = StreamDecoder::new();
        dec.feed(&[0x13, 0x37]);
        dec.feed(&silent_frame());
        dec.feed(&silent_frame());
        dec.feed(&silent_frame());
        let mut consumed_frames = 0;
        loop {
            match dec.decode_next() {
                DecodeStep::Frame | DecodeStep::Skipped => consumed_frames += 1,
                DecodeStep::NeedMore => break,
            }
        }
        // Two confirmed frames; the third awaits its successor.
        assert_eq!(consumed_frames, 2);
        assert_eq!(dec.backlog_len(), 417);
    }

    #[test]
    fn format_tracks_decoded_frames() {
        let mut dec = StreamDecoder::new();
        dec.feed(&silent_frame());
        dec.feed(&silent_frame());
        if matches!(dec.decode_next(), DecodeStep::Frame) {
            let fmt = dec.format().unwrap();
            assert_eq!(fmt.sample_rate, 44_100);
            assert_eq!(fmt.channels, 2);
        }
    }
}
