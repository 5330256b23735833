use tracing::warn;

use super::ByteSource;

/// Line buffer capacity, including the terminator and NUL slots.
pub const LINE_CAPACITY: usize = 45;

/// Longest line accepted, terminator excluded.
pub const MAX_LINE_LEN: usize = LINE_CAPACITY - 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    /// A complete, non-empty line (terminator stripped).
    Line(String),
    /// The source ran dry before a terminator; the partial line is kept.
    Pending,
    /// The line was dropped: empty, over-length or interrupted by a read failure.
    Dropped,
}

/// Assembles bytes into `\n` or `\r\n` terminated lines inside a fixed buffer.
#[derive(Debug, Clone)]
pub struct LineReader {
    buf: [u8; LINE_CAPACITY],
    len: usize,
    discarding: bool,
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LineReader {
    pub fn new() -> Self {
        Self {
            buf: [0; LINE_CAPACITY],
            len: 0,
            discarding: false,
        }
    }

    pub fn buffered_len(&self) -> usize {
        self.len
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Scans at most one line's worth of bytes from `io`.
    pub fn read_line<S: ByteSource + ?Sized>(&mut self, io: &mut S) -> ReadStatus {
        while io.available() > 0 {
            let byte = match io.read_byte() {
                Ok(byte) => byte,
                Err(err) => {
                    warn!("failed to read line byte: {err}");
                    self.reset();
                    self.discarding = false;
                    return ReadStatus::Dropped;
                }
            };

            if self.discarding {
                if byte == b'\n' {
                    self.discarding = false;
                }
                continue;
            }

            if byte == b'\n' {
                return self.finish_line();
            }

            if self.len == MAX_LINE_LEN {
                warn!(
                    "line is too long: {}",
                    String::from_utf8_lossy(&self.buf[..self.len])
                );
                self.reset();
                self.discarding = true;
                return ReadStatus::Dropped;
            }

            self.buf[self.len] = byte;
            self.len += 1;
        }

        ReadStatus::Pending
    }

    fn finish_line(&mut self) -> ReadStatus {
        let mut end = self.len;
        if end > 0 && self.buf[end - 1] == b'\r' {
            end -= 1;
        }
        let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.reset();

        if line.is_empty() {
            ReadStatus::Dropped
        } else {
            ReadStatus::Line(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::error::ProtocolError;

    fn source(bytes: &[u8]) -> VecDeque<u8> {
        bytes.iter().copied().collect()
    }

    #[test]
    fn strips_crlf_and_lf() {
        let mut reader = LineReader::new();
        let mut io = source(b"Speed: 3\r\nSpeed: 4\n");

        assert_eq!(reader.read_line(&mut io), ReadStatus::Line("Speed: 3".into()));
        assert_eq!(reader.read_line(&mut io), ReadStatus::Line("Speed: 4".into()));
        assert_eq!(reader.read_line(&mut io), ReadStatus::Pending);
    }

    #[test]
    fn empty_lines_are_dropped() {
        let mut reader = LineReader::new();
        let mut io = source(b"\r\n\n");

        assert_eq!(reader.read_line(&mut io), ReadStatus::Dropped);
        assert_eq!(reader.read_line(&mut io), ReadStatus::Dropped);
        assert_eq!(reader.read_line(&mut io), ReadStatus::Pending);
    }

    #[test]
    fn byte_at_a_time_never_exceeds_capacity() {
        let mut reader = LineReader::new();
        let mut stream = vec![b'x'; 100];
        stream.extend_from_slice(b"\nSpeed: 2\r\n");

        let mut lines = Vec::new();
        let mut io = VecDeque::new();
        for byte in stream {
            io.push_back(byte);
            if let ReadStatus::Line(line) = reader.read_line(&mut io) {
                lines.push(line);
            }
            assert!(reader.buffered_len() < LINE_CAPACITY);
        }

        // The over-length line is dropped up to its terminator, the next line is clean.
        assert_eq!(lines, vec!["Speed: 2".to_string()]);
    }

    #[test]
    fn longest_line_that_fits() {
        let mut reader = LineReader::new();
        let mut stream = vec![b'a'; MAX_LINE_LEN];
        stream.push(b'\n');
        let mut io = source(&stream);
        assert!(matches!(reader.read_line(&mut io), ReadStatus::Line(line) if line.len() == 43));

        let mut stream = vec![b'a'; MAX_LINE_LEN + 1];
        stream.push(b'\n');
        let mut io = source(&stream);
        assert_eq!(reader.read_line(&mut io), ReadStatus::Dropped);
        assert_eq!(reader.read_line(&mut io), ReadStatus::Pending);
        assert_eq!(reader.buffered_len(), 0);
    }

    struct FailingSource {
        bytes: VecDeque<u8>,
        fail_at: usize,
        reads: usize,
    }

    impl ByteSource for FailingSource {
        fn available(&self) -> usize {
            self.bytes.len()
        }

        fn read_byte(&mut self) -> Result<u8, ProtocolError> {
            self.reads += 1;
            if self.reads == self.fail_at {
                return Err(ProtocolError::ReadFailed);
            }
            self.bytes.pop_front().ok_or(ProtocolError::ReadFailed)
        }
    }

    #[test]
    fn read_failure_clears_buffer_and_resumes() {
        let mut reader = LineReader::new();
        let mut io = FailingSource {
            bytes: source(b"Speed: 5\nSpeed: 6\n"),
            fail_at: 3,
            reads: 0,
        };

        assert_eq!(reader.read_line(&mut io), ReadStatus::Dropped);
        assert_eq!(reader.buffered_len(), 0);

        // The remainder of the interrupted line is parsed as its own line.
        assert_eq!(reader.read_line(&mut io), ReadStatus::Line("eed: 5".into()));
        assert_eq!(reader.read_line(&mut io), ReadStatus::Line("Speed: 6".into()));
    }
}
