use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

pub const DEFAULT_READ_BUFFER_BYTES: usize = 8192;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Frame {
    /// Bytes preceding the newline, untrimmed.
    Complete { frame_number: usize, bytes: Vec<u8> },
    /// The frame outgrew the limit; its bytes were discarded as they arrived.
    TooLong {
        frame_number: usize,
        observed_bytes: usize,
        max_frame_bytes: usize,
    },
}

impl Frame {
    pub fn frame_number(&self) -> usize {
        match self {
            Self::Complete { frame_number, .. } | Self::TooLong { frame_number, .. } => {
                *frame_number
            }
        }
    }
}

/// Splits an async byte stream into `\n`-terminated frames with bounded memory.
///
/// Partial frame state lives in the reader rather than in the future returned by
/// [`FrameReader::next_frame`], so dropping that future mid-read loses nothing.
pub struct FrameReader<R> {
    reader: BufReader<R>,
    max_frame_bytes: usize,
    current: Vec<u8>,
    observed_bytes: usize,
    discarding: bool,
    frame_number: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_frame_bytes: usize) -> Self {
        Self::with_capacity(DEFAULT_READ_BUFFER_BYTES, reader, max_frame_bytes)
    }

    /// A zero `capacity` or `max_frame_bytes` falls back to the default.
    pub fn with_capacity(capacity: usize, reader: R, max_frame_bytes: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_READ_BUFFER_BYTES
        } else {
            capacity
        };
        let max_frame_bytes = if max_frame_bytes == 0 {
            DEFAULT_MAX_FRAME_BYTES
        } else {
            max_frame_bytes
        };
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            max_frame_bytes,
            current: Vec::new(),
            observed_bytes: 0,
            discarding: false,
            frame_number: 0,
        }
    }

    /// Number of frames handed out so far, including oversized ones.
    pub fn frames_seen(&self) -> usize {
        self.frame_number
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` at end-of-stream. Trailing bytes without a newline are
    /// not a frame and are dropped. A read error also drops the partial frame, so
    /// the next read starts a fresh one.
    pub async fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            let available = match self.reader.fill_buf().await {
                Ok(available) => available,
                Err(err) => {
                    if self.observed_bytes > 0 {
                        debug!(
                            pending_bytes = self.observed_bytes,
                            "discarding partial frame after read error"
                        );
                        self.reset_frame_state();
                    }
                    return Err(err);
                }
            };
            if available.is_empty() {
                if self.observed_bytes > 0 {
                    debug!(
                        pending_bytes = self.observed_bytes,
                        "discarding unterminated bytes at end of stream"
                    );
                    self.reset_frame_state();
                }
                return Ok(None);
            }

            let newline = available.iter().position(|b| *b == b'\n');
            let segment_len = newline.unwrap_or(available.len());

            self.observed_bytes = self.observed_bytes.saturating_add(segment_len);
            if self.observed_bytes > self.max_frame_bytes && !self.discarding {
                self.discarding = true;
                self.current = Vec::new();
            }
            if !self.discarding {
                self.current.extend_from_slice(&available[..segment_len]);
            }

            match newline {
                Some(idx) => {
                    self.reader.consume(idx + 1);
                    return Ok(Some(self.finish_frame()));
                }
                None => {
                    let consumed = available.len();
                    self.reader.consume(consumed);
                }
            }
        }
    }

    fn finish_frame(&mut self) -> Frame {
        self.frame_number += 1;
        let frame_number = self.frame_number;

        let frame = if self.discarding {
            Frame::TooLong {
                frame_number,
                observed_bytes: self.observed_bytes,
                max_frame_bytes: self.max_frame_bytes,
            }
        } else {
            Frame::Complete {
                frame_number,
                bytes: std::mem::take(&mut self.current),
            }
        };
        self.reset_frame_state();
        frame
    }

    fn reset_frame_state(&mut self) {
        self.current.clear();
        self.observed_bytes = 0;
        self.discarding = false;
    }
}

/// Strips leading and trailing ASCII whitespace, `\r` included.
pub fn trim_frame(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |idx| idx + 1);
    &bytes[start..end]
}
