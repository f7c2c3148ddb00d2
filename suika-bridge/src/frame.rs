//! Bounded line framing and rate limiting for the raw input channel.
//!
//! Every non-blank line is first offered to the [`RateLimiter`]. Lines
//! arriving faster than the configured interval are consumed and reported as
//! [`FrameEvent::Dropped`]; nothing is queued. Lines longer than the frame cap
//! are consumed up to their terminator and reported as
//! [`FrameEvent::Oversized`] rather than truncated.

use std::borrow::Cow;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use suika_common::Uptime;

/// Errors raised while reading from the input channel.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Input read error: {0}")]
    Io(#[from] std::io::Error),
}

/// One complete input record, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Vec<u8>,
}

impl RawFrame {
    /// Wrap already-framed bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// The record bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The record as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Record length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-length record.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Outcome of reading one line from the input channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A frame admitted by the rate limiter.
    Frame(RawFrame),
    /// A line admitted by the rate limiter but longer than the frame cap.
    /// `head` holds the first `limit` bytes for diagnostics.
    Oversized {
        len: usize,
        limit: usize,
        head: RawFrame,
    },
    /// A line discarded because it arrived before the minimum interval elapsed.
    Dropped,
}

/// Minimum-interval admission control on accepted frames.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval_ms: u64,
    last_accepted_ms: Option<u64>,
}

impl RateLimiter {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_accepted_ms: None,
        }
    }

    /// Admit a frame arriving at `now_ms`, recording it as the last accepted
    /// frame, or reject it if it is too close to the previous one.
    pub fn admit(&mut self, now_ms: u64) -> bool {
        match self.last_accepted_ms {
            Some(last) if now_ms.saturating_sub(last) < self.min_interval_ms => false,
            _ => {
                self.last_accepted_ms = Some(now_ms);
                true
            }
        }
    }

    /// Tick of the last admitted frame.
    pub fn last_accepted_ms(&self) -> Option<u64> {
        self.last_accepted_ms
    }
}

/// Reads bounded newline-terminated records from an async byte stream.
///
/// Partial lines are kept inside the reader, so [`FrameReader::next_frame`]
/// is cancel safe and can sit in a `tokio::select!` loop.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    max_frame_bytes: usize,
    pending: Vec<u8>,
    pending_len: usize,
    /// No non-whitespace byte seen on the current line, kept or discarded.
    pending_blank: bool,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max_frame_bytes: usize) -> Self {
        Self {
            inner,
            max_frame_bytes,
            pending: Vec::with_capacity(max_frame_bytes + 1),
            pending_len: 0,
            pending_blank: true,
        }
    }

    /// Read the next non-blank line and run it through the rate limiter.
    ///
    /// Returns `Ok(None)` at end of stream. A trailing line without a
    /// terminator is still delivered before end of stream.
    pub async fn next_frame(
        &mut self,
        limiter: &mut RateLimiter,
        uptime: &Uptime,
    ) -> Result<Option<FrameEvent>, FrameError> {
        loop {
            let Some(len) = self.read_line().await? else {
                return Ok(None);
            };

            if self.pending_blank {
                self.reset_pending();
                continue;
            }

            let truncated = len > self.pending.len();
            let line = trim_ascii(&self.pending);

            let event = if !limiter.admit(uptime.millis()) {
                FrameEvent::Dropped
            } else if truncated || line.len() > self.max_frame_bytes {
                FrameEvent::Oversized {
                    len,
                    limit: self.max_frame_bytes,
                    head: RawFrame::new(&line[..line.len().min(self.max_frame_bytes)]),
                }
            } else {
                FrameEvent::Frame(RawFrame::new(line))
            };

            self.reset_pending();
            return Ok(Some(event));
        }
    }

    /// Fill `pending` with the next line. Returns the full line length
    /// (which may exceed what was kept) or `None` at end of stream.
    async fn read_line(&mut self) -> Result<Option<usize>, FrameError> {
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                if self.pending_len == 0 {
                    return Ok(None);
                }
                return Ok(Some(self.pending_len));
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let take = newline.unwrap_or(available.len());
            if available[..take].iter().any(|b| !b.is_ascii_whitespace()) {
                self.pending_blank = false;
            }

            // One byte of slack so a trailing '\r' does not count against the cap.
            let room = (self.max_frame_bytes + 1).saturating_sub(self.pending.len());
            self.pending.extend_from_slice(&available[..take.min(room)]);
            self.pending_len += take;

            let consumed = if newline.is_some() { take + 1 } else { take };
            self.inner.consume(consumed);

            if newline.is_some() {
                return Ok(Some(self.pending_len));
            }
        }
    }

    fn reset_pending(&mut self) {
        self.pending.clear();
        self.pending_len = 0;
        self.pending_blank = true;
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
