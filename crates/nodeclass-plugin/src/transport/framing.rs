//! Bounded newline-delimited framing over a byte stream.

use std::io::{self, BufRead, BufReader, Read};

/// Maximum size of a single call line in bytes, not counting its newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One unit read from the connection.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A complete line, or the unterminated tail before EOF.
    Line(Vec<u8>),
    /// A line over the limit; its bytes were consumed and dropped.
    Oversized { size: usize },
}

/// Reads frames from `inner` without ever buffering more than the limit.
pub(crate) struct FrameReader<R> {
    inner: BufReader<R>,
    limit: usize,
}

impl<R: Read> FrameReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self::with_limit(inner, MAX_LINE_BYTES)
    }

    pub(crate) fn with_limit(inner: R, limit: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            limit,
        }
    }

    /// Returns the next frame, or `None` at a clean end of stream.
    pub(crate) fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        let mut line = Vec::new();
        let cap = u64::try_from(self.limit).unwrap_or(u64::MAX).saturating_add(1);
        let read = self.inner.by_ref().take(cap).read_until(b'\n', &mut line)?;
        if read == 0 {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') || line.len() <= self.limit {
            return Ok(Some(Frame::Line(line)));
        }
        let skipped = self.discard_rest_of_line()?;
        Ok(Some(Frame::Oversized {
            size: line.len().saturating_add(skipped),
        }))
    }

    fn discard_rest_of_line(&mut self) -> io::Result<usize> {
        let mut skipped = 0_usize;
        loop {
            let available = match self.inner.fill_buf() {
                Ok(available) => available,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            };
            if available.is_empty() {
                return Ok(skipped);
            }
            match available.iter().position(|byte| *byte == b'\n') {
                Some(pos) => {
                    self.inner.consume(pos + 1);
                    return Ok(skipped.saturating_add(pos + 1));
                }
                None => {
                    let len = available.len();
                    self.inner.consume(len);
                    skipped = skipped.saturating_add(len);
                }
            }
        }
    }
}
