//! MPEG audio (Layer III) frame header parsing and frame boundary scanning.
//!
//! A live stream is joined mid-broadcast, so the byte backlog can start with
//! a partial frame or stray bytes that happen to contain the sync pattern.
//! [`scan`] finds the next frame whose length checks out *and* whose end is
//! followed by another plausible header, which is what makes resync reliable.

/// MPEG version, from the two version bits of the frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MpegVersion {
    V1,
    V2,
    V25,
}

/// Parsed Layer III frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub(crate) version: MpegVersion,
    pub(crate) sample_rate: u32,
    pub(crate) channels: usize,
    pub(crate) bitrate_kbps: u32,
    /// Whole frame length in bytes, header included.
    pub(crate) frame_len: usize,
}

/// Result of scanning the compressed backlog for the next decodable frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scan {
    /// A confirmed frame occupies `buf[start..start + header.frame_len]`.
    Frame { start: usize, header: FrameHeader },
    /// No confirmed frame yet; bytes before `keep_from` are not part of any
    /// future frame and can be discarded.
    NeedMore { keep_from: usize },
}

const BITRATES_V1_L3: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const BITRATES_V2_L3: [u32; 16] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];

/// Parse a 4-byte Layer III frame header.
///
/// Returns `None` for anything that is not a valid, fixed-bitrate Layer III
/// header (free-format and reserved field values are rejected, which also
/// filters out most false syncs).
pub(crate) fn parse_header(b: [u8; 4]) -> Option<FrameHeader> {
    if b[0] != 0xFF || b[1] & 0xE0 != 0xE0 {
        return None;
    }

    let version = match (b[1] >> 3) & 0x3 {
        0 => MpegVersion::V25,
        2 => MpegVersion::V2,
        3 => MpegVersion::V1,
        _ => return None,
    };

    // Layer III only; the input contract is an MP3 elementary stream.
    if (b[1] >> 1) & 0x3 != 0x1 {
        return None;
    }

    let bitrate_index = (b[2] >> 4) & 0xF;
    if bitrate_index == 0 || bitrate_index == 0xF {
        return None;
    }
    let bitrate_kbps = match version {
        MpegVersion::V1 => BITRATES_V1_L3[bitrate_index as usize],
        MpegVersion::V2 | MpegVersion::V25 => BITRATES_V2_L3[bitrate_index as usize],
    };

    let sample_rate_index = (b[2] >> 2) & 0x3;
    if sample_rate_index == 0x3 {
        return None;
    }
    let sample_rate = match version {
        MpegVersion::V1 => [44_100, 48_000, 32_000][sample_rate_index as usize],
        MpegVersion::V2 => [22_050, 24_000, 16_000][sample_rate_index as usize],
        MpegVersion::V25 => [11_025, 12_000, 8_000][sample_rate_index as usize],
    };

    let padding = ((b[2] >> 1) & 0x1) as usize;
    let per_frame = match version {
        MpegVersion::V1 => 144_000,
        MpegVersion::V2 | MpegVersion::V25 => 72_000,
    };
    let frame_len = (per_frame * bitrate_kbps as usize) / sample_rate as usize + padding;
    if frame_len <= 4 {
        return None;
    }

    let channels = if (b[3] >> 6) & 0x3 == 0x3 { 1 } else { 2 };

    Some(FrameHeader {
        version,
        sample_rate,
        channels,
        bitrate_kbps,
        frame_len,
    })
}

/// Whether the bytes at `buf[at..]` look like the next frame of `prev`.
///
/// Bitrate and padding may differ frame to frame (VBR); version and sample
/// rate must not.
fn confirms(buf: &[u8], at: usize, prev: &FrameHeader) -> bool {
    let Some(next) = header_at(buf, at) else {
        return false;
    };
    next.version == prev.version && next.sample_rate == prev.sample_rate
}

fn header_at(buf: &[u8], at: usize) -> Option<FrameHeader> {
    if at + 4 > buf.len() {
        return None;
    }
    parse_header([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Find the next confirmed frame in `buf`.
///
/// A frame is only reported once the header of the frame *after* it is in the
/// buffer too; until then the scan reports `NeedMore` while holding position.
pub(crate) fn scan(buf: &[u8]) -> Scan {
    let mut i = 0;
    while i + 4 <= buf.len() {
        let Some(header) = header_at(buf, i) else {
            i += 1;
            continue;
        };

        let end = i + header.frame_len;
        if end + 4 > buf.len() {
            // Frame (or its confirmation header) not fully received yet.
            return Scan::NeedMore { keep_from: i };
        }
        if confirms(buf, end, &header) {
            return Scan::Frame { start: i, header };
        }

        // False sync; keep searching one byte further.
        i += 1;
    }

    // No sync candidate; keep only a potential partial header at the tail.
    Scan::NeedMore {
        keep_from: buf.len().saturating_sub(3),
    }
}
