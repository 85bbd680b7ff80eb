//! CRLF line framer.
//!
//! Turns an arbitrarily chunked byte stream into one delimited line per call.
//! Bytes are pulled one at a time so the delimiter boundary is detected exactly,
//! even when a peer splits `\r` and `\n` across separate writes. Nothing is read
//! past the delimiter, so the next call starts on a clean line boundary.
//!
//! Every call yields exactly one [`ReadOutcome`]:
//! - `Line`: the bytes before the first `\r\n`, decoded one byte per character
//! - `Closed`: the peer ended the stream before a delimiter arrived
//! - `Timeout`: no byte arrived within the deadline
//! - `Failed`: any other transport error, a non-text byte, or an oversized line
//!
//! A partial line is never returned; on any failure the accumulated bytes are
//! discarded along with the buffer.

use bytes::{BufMut, BytesMut};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Line delimiter: carriage return followed by line feed.
pub const DELIMITER: &[u8; 2] = b"\r\n";

/// Default per-read deadline.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Initial accumulation capacity; typical protocol lines are short.
const INITIAL_CAPACITY: usize = 128;

/// Byte stream the framer can read from.
///
/// The framer needs a way to bound a blocking read. `set_deadline(None)` must
/// restore fully blocking reads.
pub trait Transport: Read + Write {
    /// Bound subsequent reads to `timeout`, or block indefinitely on `None`.
    fn set_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Shut down both directions of the stream.
    fn shutdown_both(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)
    }

    fn shutdown_both(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// Failure that ends a read without producing a line.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("read failure: {0}")]
    Io(#[source] io::Error),

    #[error("non-text byte 0x{byte:02x} at offset {offset}")]
    NotText { offset: usize, byte: u8 },

    #[error("line exceeds {limit} bytes without a delimiter")]
    LineTooLong { limit: usize },
}

/// Result of one read attempt.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete line, delimiter stripped.
    Line(String),
    /// Peer closed the stream before a delimiter arrived.
    Closed,
    /// No byte arrived within the deadline. The connection stays usable.
    Timeout,
    /// Transport or decoding failure.
    Failed(FrameError),
}

/// Read-side framing settings: deadline and optional line length cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framer {
    timeout: Duration,
    max_line_length: Option<usize>,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(DEFAULT_READ_TIMEOUT)
    }
}

impl Framer {
    /// Create a framer with the given per-read deadline and no length cap.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_line_length: None,
        }
    }

    /// Cap the line length (delimiter excluded).
    pub fn with_max_line_length(mut self, limit: Option<usize>) -> Self {
        self.max_line_length = limit;
        self
    }

    /// Read exactly one line from `stream`.
    ///
    /// Times out only when the peer stays silent for the whole deadline; each
    /// arriving byte restarts the wait. The deadline is cleared before
    /// returning on every path, so later reads and writes on the same stream
    /// are unaffected.
    pub fn read_line<T: Transport + ?Sized>(&self, stream: &mut T) -> ReadOutcome {
        let outcome = self.accumulate(stream);

        if let Err(e) = stream.set_deadline(None) {
            warn!(error = %e, "Failed to clear read deadline");
            if !matches!(outcome, ReadOutcome::Failed(_)) {
                return ReadOutcome::Failed(FrameError::Io(e));
            }
        }

        outcome
    }

    fn accumulate<T: Transport + ?Sized>(&self, stream: &mut T) -> ReadOutcome {
        let mut buffer = BytesMut::with_capacity(INITIAL_CAPACITY);
        let mut byte = [0u8; 1];

        // The socket timeout bounds each read, so it restarts with every byte.
        if let Err(e) = stream.set_deadline(Some(self.timeout)) {
            return ReadOutcome::Failed(FrameError::Io(e));
        }

        while !buffer.ends_with(DELIMITER) {
            if let Some(limit) = self.max_line_length {
                if pending_len(&buffer) > limit {
                    debug!(limit, "Line length limit exceeded");
                    return ReadOutcome::Failed(FrameError::LineTooLong { limit });
                }
            }

            match stream.read(&mut byte) {
                Ok(0) => {
                    debug!(discarded = buffer.len(), "Stream closed before delimiter");
                    return ReadOutcome::Closed;
                }
                Ok(_) => buffer.put_u8(byte[0]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    debug!(discarded = buffer.len(), "Read deadline passed");
                    return ReadOutcome::Timeout;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return ReadOutcome::Failed(FrameError::Io(e)),
            }
        }

        buffer.truncate(buffer.len() - DELIMITER.len());
        trace!(len = buffer.len(), "Framed line");

        match decode(&buffer) {
            Ok(line) => ReadOutcome::Line(line),
            Err(e) => ReadOutcome::Failed(e),
        }
    }
}

/// Read one line with the given deadline and no length cap.
pub fn read_line<T: Transport + ?Sized>(stream: &mut T, timeout: Duration) -> ReadOutcome {
    Framer::new(timeout).read_line(stream)
}

/// Line bytes accumulated so far, not counting a trailing `\r` that may be
/// the first half of the delimiter.
fn pending_len(buffer: &[u8]) -> usize {
    match buffer.last() {
        Some(b'\r') => buffer.len() - 1,
        _ => buffer.len(),
    }
}

/// Decode line bytes as single-byte ASCII characters.
fn decode(bytes: &[u8]) -> Result<String, FrameError> {
    match bytes.iter().position(|b| !b.is_ascii()) {
        Some(offset) => Err(FrameError::NotText {
            offset,
            byte: bytes[offset],
        }),
        None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}
