//! Newline framing with a flood threshold.
//!
//! Bytes are accumulated until a `\n` shows up. Each complete line is decoded
//! as UTF-8, trimmed, and returned if non-empty. The threshold is enforced on
//! the incoming chunk before it is appended, so the buffer never holds
//! `threshold` bytes or more.

use crate::error::ProtocolError;
use bytes::{Buf, BytesMut};

/// Accumulates raw bytes and splits them into trimmed, non-empty lines.
pub struct LineFramer {
    buffer: BytesMut,
    threshold: usize,
}

impl LineFramer {
    pub fn new(threshold: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(threshold.min(crate::DEFAULT_MAX_BUFFER_SIZE)),
            threshold,
        }
    }

    /// Appends a chunk read from the transport.
    ///
    /// Fails without appending if the buffered length plus the chunk would
    /// reach the threshold.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), ProtocolError> {
        let size = self.buffer.len() + chunk.len();
        if size >= self.threshold {
            return Err(ProtocolError::BufferOverflow {
                size,
                max: self.threshold,
            });
        }
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    /// Extracts the next complete, non-empty line.
    ///
    /// Returns `None` when no newline is buffered. Blank lines are consumed
    /// and skipped.
    pub fn next_line(&mut self) -> Option<Result<String, ProtocolError>> {
        loop {
            let pos = self.buffer.iter().position(|&b| b == b'\n')?;
            let line = self.buffer.split_to(pos);
            self.buffer.advance(1);

            let text = match std::str::from_utf8(&line) {
                Ok(text) => text.trim(),
                Err(_) => return Some(Err(ProtocolError::InvalidUtf8)),
            };
            if !text.is_empty() {
                return Some(Ok(text.to_string()));
            }
        }
    }

    /// Returns the number of bytes waiting for a newline.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drain(framer: &mut LineFramer) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = framer.next_line() {
            lines.push(line.unwrap());
        }
        lines
    }

    #[test]
    fn test_single_line() {
        let mut framer = LineFramer::default();
        framer.push(b"{\"method\":\"ping\"}\n").unwrap();
        assert_eq!(drain(&mut framer), vec!["{\"method\":\"ping\"}"]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_partial_line() {
        let mut framer = LineFramer::default();
        framer.push(b"{\"id\":1,\"meth").unwrap();
        assert!(framer.next_line().is_none());

        framer.push(b"od\":\"ping\"}\n{\"id\"").unwrap();
        assert_eq!(drain(&mut framer), vec!["{\"id\":1,\"method\":\"ping\"}"]);
        assert_eq!(framer.buffered(), 5);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut framer = LineFramer::default();
        framer.push(b"\n   \n\r\n a \r\n\t\n b\n").unwrap();
        assert_eq!(drain(&mut framer), vec!["a", "b"]);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let text = "{\"method\":\"héllo\"}\n".as_bytes();
        let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut framer = LineFramer::default();
        framer.push(&text[..split]).unwrap();
        assert!(framer.next_line().is_none());
        framer.push(&text[split..]).unwrap();
        assert_eq!(drain(&mut framer), vec!["{\"method\":\"héllo\"}"]);
    }

    #[test]
    fn test_invalid_utf8_line() {
        let mut framer = LineFramer::default();
        framer.push(b"\xff\xfe\nok\n").unwrap();
        assert!(matches!(
            framer.next_line(),
            Some(Err(ProtocolError::InvalidUtf8))
        ));
        // The bad line is consumed; the framer itself stays usable.
        assert_eq!(drain(&mut framer), vec!["ok"]);
    }

    #[test]
    fn test_flood_threshold() {
        let mut framer = LineFramer::new(16);
        framer.push(&[b'x'; 10]).unwrap();
        framer.push(&[b'x'; 5]).unwrap();
        assert_eq!(framer.buffered(), 15);

        let err = framer.push(b"x").unwrap_err();
        match err {
            ProtocolError::BufferOverflow { size, max } => {
                assert_eq!(size, 16);
                assert_eq!(max, 16);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Rejected chunk is not appended.
        assert_eq!(framer.buffered(), 15);
    }

    #[test]
    fn test_flood_checked_before_newline_scan() {
        // A chunk that would reach the threshold fails even if it holds a newline.
        let mut framer = LineFramer::new(8);
        assert!(framer.push(b"abcdef\n\n").is_err());
        assert!(framer.next_line().is_none());
    }

    #[test]
    fn test_consumed_lines_free_space() {
        let mut framer = LineFramer::new(8);
        for _ in 0..10 {
            framer.push(b"abcd\n").unwrap();
            assert_eq!(drain(&mut framer), vec!["abcd"]);
        }
    }

    proptest! {
        #[test]
        fn prop_lines_survive_any_chunking(
            lines in proptest::collection::vec("[a-z0-9{}:\",]{1,40}", 1..20),
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..10),
        ) {
            let wire: Vec<u8> = lines.iter().flat_map(|l| format!("{}\n", l).into_bytes()).collect();
            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(wire.len())).collect();
            points.push(0);
            points.push(wire.len());
            points.sort_unstable();
            points.dedup();

            let mut framer = LineFramer::new(wire.len() + 1);
            let mut out = Vec::new();
            for window in points.windows(2) {
                framer.push(&wire[window[0]..window[1]]).unwrap();
                out.extend(drain(&mut framer));
            }
            prop_assert_eq!(out, lines);
            prop_assert_eq!(framer.buffered(), 0);
        }
    }
}
