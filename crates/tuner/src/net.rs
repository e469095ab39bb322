//! Network fetch bridge: one streaming HTTP GET per session.
//!
//! The transfer follows redirects (ureq default) and applies no timeout — a
//! live broadcast runs until somebody hangs up. Every received chunk goes to
//! the consumer callback synchronously on the calling thread; the callback
//! returns how many bytes it consumed, and anything short of the full chunk
//! aborts the transfer. An abort is a normal stop path, not an error.

use std::io::Read;

use anyhow::{Context, Result};

/// How a transfer ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FetchOutcome {
    /// The remote closed the stream.
    Finished,
    /// The chunk consumer asked to stop.
    Aborted,
}

/// Stream `url`, delivering chunks of at most `chunk_bytes` to `on_chunk`.
pub(crate) fn fetch_stream(
    url: &str,
    chunk_bytes: usize,
    on_chunk: impl FnMut(&[u8]) -> usize,
) -> Result<FetchOutcome> {
    let resp = ureq::get(url)
        .config()
        .timeout_global(None)
        .build()
        .call()
        .context("http request failed")?;

    let status = resp.status();
    let content_type = resp
        .headers()
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    tracing::info!(%url, status = %status, content_type = %content_type, "stream connected");

    let (_, body) = resp.into_parts();
    let outcome = deliver_chunks(body.into_reader(), chunk_bytes, on_chunk)?;
    tracing::info!(outcome = ?outcome, "transfer ended");
    Ok(outcome)
}

/// Chunk delivery loop, factored over `Read` so transport and consumption
/// stay separately testable.
fn deliver_chunks(
    mut reader: impl Read,
    chunk_bytes: usize,
    mut on_chunk: impl FnMut(&[u8]) -> usize,
) -> Result<FetchOutcome> {
    let mut buf = vec![0u8; chunk_bytes.max(1)];
    loop {
        let received = match reader.read(&mut buf) {
            Ok(0) => return Ok(FetchOutcome::Finished),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("stream read failed"),
        };
        let consumed = on_chunk(&buf[..received]);
        if consumed < received {
            tracing::debug!(consumed, received, "transfer aborted by consumer");
            return Ok(FetchOutcome::Aborted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn delivers_all_bytes_in_order() {
        let data: Vec<u8> = (0u8..200).collect();
        let mut seen = Vec::new();
        let outcome = deliver_chunks(Cursor::new(data.clone()), 64, |chunk| {
            seen.extend_from_slice(chunk);
            chunk.len()
        })
        .unwrap();
        assert_eq!(outcome, FetchOutcome::Finished);
        assert_eq!(seen, data);
    }

    #[test]
    fn chunks_never_exceed_requested_size() {
        let data = vec![7u8; 1000];
        let mut max_chunk = 0;
        deliver_chunks(Cursor::new(data), 256, |chunk| {
            max_chunk = max_chunk.max(chunk.len());
            chunk.len()
        })
        .unwrap();
        assert!(max_chunk <= 256);
    }

    #[test]
    fn short_consumption_aborts_transfer() {
        let data = vec![1u8; 512];
        let mut calls = 0;
        let outcome = deliver_chunks(Cursor::new(data), 128, |chunk| {
            calls += 1;
            if calls == 2 { 0 } else { chunk.len() }
        })
        .unwrap();
        assert_eq!(outcome, FetchOutcome::Aborted);
        assert_eq!(calls, 2);
    }

    #[test]
    fn empty_stream_finishes_without_callbacks() {
        let mut calls = 0;
        let outcome = deliver_chunks(Cursor::new(Vec::<u8>::new()), 128, |_| {
            calls += 1;
            0
        })
        .unwrap();
        assert_eq!(outcome, FetchOutcome::Finished);
        assert_eq!(calls, 0);
    }

    #[test]
    fn read_errors_propagate() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            }
        }
        let err = deliver_chunks(FailingReader, 128, |c| c.len()).unwrap_err();
        assert!(format!("{err:#}").contains("stream read failed"));
    }
}
