//! Ordered, bounded capture of a worker's standard output.
//!
//! A [`CaptureChannel`] is created fresh for every invocation and accumulates
//! the executing program's stdout exactly as it arrives on the pipe. Fragment
//! order equals write order; nothing is reordered or dropped below the byte
//! cap, and output past the cap is replaced by an explicit marker.

use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Marker appended when captured output exceeds the configured cap.
const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// Read size for the pipe-drain loop.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Append-only sink for one invocation's output.
///
/// The channel is shared between the runner and the pipe-drain task, so all
/// mutation goes through a mutex held only for the duration of an append,
/// never across an await point.
pub struct CaptureChannel {
    inner: Mutex<Inner>,
}

struct Inner {
    fragments: Vec<Vec<u8>>,
    captured: usize,
    max_bytes: usize,
    truncated: bool,
}

impl CaptureChannel {
    /// Create an empty channel with the given byte cap.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                fragments: Vec::new(),
                captured: 0,
                max_bytes,
                truncated: false,
            }),
        }
    }

    /// Append a fragment. Order of appends is preserved exactly.
    ///
    /// Fragments past the byte cap are discarded and the truncation flag is
    /// set; the cap boundary itself is honored mid-fragment.
    pub fn write(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let mut inner = self.lock();
        if inner.truncated {
            return;
        }
        let remaining = inner.max_bytes.saturating_sub(inner.captured);
        if remaining == 0 {
            inner.truncated = true;
            return;
        }
        let take = remaining.min(chunk.len());
        if take < chunk.len() {
            inner.truncated = true;
        }
        inner.captured += take;
        inner.fragments.push(chunk[..take].to_vec());
    }

    /// Number of bytes captured so far.
    pub fn bytes_captured(&self) -> usize {
        self.lock().captured
    }

    /// True if nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.bytes_captured() == 0
    }

    /// True if output was cut at the byte cap.
    pub fn is_truncated(&self) -> bool {
        self.lock().truncated
    }

    /// Concatenate all fragments, in append order, into one string.
    ///
    /// Invalid UTF-8 (a torn multi-byte sequence at the truncation cut, or a
    /// program writing raw bytes) is replaced, never dropped silently.
    pub fn output(&self) -> String {
        let inner = self.lock();
        let mut bytes = Vec::with_capacity(inner.captured);
        for fragment in &inner.fragments {
            bytes.extend_from_slice(fragment);
        }
        let mut text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };
        if inner.truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }

    /// Drain a worker pipe into the channel until EOF or read error.
    ///
    /// Runs concurrently with the worker so that partial output survives a
    /// deadline kill.
    pub(crate) async fn drain<R>(&self, mut reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0u8; READ_CHUNK_BYTES];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => self.write(&buf[..n]),
                Err(e) => {
                    tracing::warn!(error = %e, "capture pipe read failed");
                    break;
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_order_preserved() {
        let channel = CaptureChannel::new(1024);
        channel.write(b"Line 0\n");
        channel.write(b"Line 1\n");
        channel.write(b"Line 2\n");
        assert_eq!(channel.output(), "Line 0\nLine 1\nLine 2\n");
    }

    #[test]
    fn test_empty_channel_yields_empty_string() {
        let channel = CaptureChannel::new(1024);
        assert!(channel.is_empty());
        assert_eq!(channel.output(), "");
    }

    #[test]
    fn test_interleaved_fragments_not_merged_or_reordered() {
        let channel = CaptureChannel::new(1024);
        channel.write(b"a");
        channel.write(b"");
        channel.write(b"b");
        channel.write(b"c");
        assert_eq!(channel.output(), "abc");
        assert_eq!(channel.bytes_captured(), 3);
    }

    #[test]
    fn test_truncation_at_cap() {
        let channel = CaptureChannel::new(4);
        channel.write(b"abcdef");
        assert!(channel.is_truncated());
        assert_eq!(channel.bytes_captured(), 4);
        assert_eq!(channel.output(), format!("abcd{TRUNCATION_MARKER}"));
    }

    #[test]
    fn test_writes_after_cap_are_discarded() {
        let channel = CaptureChannel::new(2);
        channel.write(b"ab");
        channel.write(b"cd");
        assert_eq!(channel.output(), format!("ab{TRUNCATION_MARKER}"));
    }

    #[test]
    fn test_multibyte_torn_at_cut_is_replaced() {
        // "é" is two bytes; cap cuts through it.
        let channel = CaptureChannel::new(3);
        channel.write("aaé".as_bytes());
        let output = channel.output();
        assert!(output.starts_with("aa"));
        assert!(output.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_drain_reads_until_eof() {
        let channel = CaptureChannel::new(1024);
        let data: &[u8] = b"hello\nworld\n";
        channel.drain(data).await;
        assert_eq!(channel.output(), "hello\nworld\n");
    }
}
