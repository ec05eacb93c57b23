use bytes::{Bytes, BytesMut};
use memchr::memchr;
use thiserror::Error;

/// A parsed client command: element 0 is the command name, the rest are
/// arguments. All elements are binary-safe.
pub type CommandArgs = Vec<Vec<u8>>;

/// Upper bound on elements in one command array. Declared lengths are
/// client-controlled; anything past this is malformed, not pending data.
const MAX_ARRAY_LENGTH: i64 = 1024 * 1024;

/// Upper bound on a single bulk string payload (512MB, Redis's own
/// proto-max-bulk-len ceiling).
const MAX_BULK_LENGTH: i64 = 512 * 1024 * 1024;

/// Failure modes of request parsing.
///
/// The message strings are part of the observable contract: clients see
/// them verbatim in error replies. Variants flagged by
/// [`ParseError::is_incomplete`] mean the bytes seen so far are a valid
/// prefix of a command, not garbage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid RESP command: must start with '*'")]
    MissingArrayPrefix,

    #[error("Invalid RESP command: missing array length terminator")]
    MissingArrayLengthTerminator,

    #[error("Invalid RESP command: invalid array length")]
    InvalidArrayLength,

    #[error("Invalid RESP command: expected bulk string")]
    ExpectedBulkString,

    #[error("Invalid RESP command: missing bulk string length terminator")]
    MissingBulkLengthTerminator,

    #[error("Invalid RESP command: invalid bulk string length")]
    InvalidBulkLength,

    #[error("Invalid RESP command: bulk string content too short")]
    BulkContentTooShort,

    #[error("Invalid RESP command: incomplete command")]
    Incomplete,
}

impl ParseError {
    /// True when the input is a valid prefix that simply has not fully
    /// arrived yet. The connection keeps such bytes buffered and waits
    /// for the next read instead of replying with an error.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            ParseError::MissingArrayLengthTerminator
                | ParseError::MissingBulkLengthTerminator
                | ParseError::BulkContentTooShort
                | ParseError::Incomplete
        )
    }
}

/// Parse one command (a RESP array of bulk strings) from the front of
/// `buf`, returning the arguments and the number of bytes consumed.
///
/// `buf` may hold less than one command (an incomplete-flavored error)
/// or more than one (the caller resubmits the remainder). `*0\r\n` is a
/// valid empty command.
pub fn parse_command(buf: &[u8]) -> Result<(CommandArgs, usize), ParseError> {
    if buf.is_empty() {
        return Err(ParseError::Incomplete);
    }
    if buf[0] != b'*' {
        return Err(ParseError::MissingArrayPrefix);
    }

    let (digits, mut pos) =
        read_line(buf, 1).ok_or(ParseError::MissingArrayLengthTerminator)?;
    let count = parse_decimal(digits).ok_or(ParseError::InvalidArrayLength)?;
    if !(0..=MAX_ARRAY_LENGTH).contains(&count) {
        return Err(ParseError::InvalidArrayLength);
    }

    // Reservation is capped: the count is not trusted until the
    // elements actually arrive.
    let mut args = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        if pos >= buf.len() {
            return Err(ParseError::Incomplete);
        }
        if buf[pos] != b'$' {
            return Err(ParseError::ExpectedBulkString);
        }

        let (digits, data_start) =
            read_line(buf, pos + 1).ok_or(ParseError::MissingBulkLengthTerminator)?;
        let len = parse_decimal(digits).ok_or(ParseError::InvalidBulkLength)?;
        if !(0..=MAX_BULK_LENGTH).contains(&len) {
            return Err(ParseError::InvalidBulkLength);
        }

        let data_end = data_start + len as usize;
        // Content plus its trailing CRLF must be fully buffered.
        if data_end + 2 > buf.len() {
            return Err(ParseError::BulkContentTooShort);
        }

        args.push(buf[data_start..data_end].to_vec());
        pos = data_end + 2;
    }

    Ok((args, pos))
}

/// Find the CRLF-terminated line starting at `start`; returns the line
/// contents and the position just past the terminator.
#[inline]
fn read_line(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let mut pos = start;
    while pos < buf.len() {
        let cr = pos + memchr(b'\r', &buf[pos..])?;
        if cr + 1 < buf.len() {
            if buf[cr + 1] == b'\n' {
                return Some((&buf[start..cr], cr + 2));
            }
            pos = cr + 1;
        } else {
            return None;
        }
    }
    None
}

/// Strict decimal ASCII integer: optional '-', at least one digit.
#[inline]
fn parse_decimal(digits: &[u8]) -> Option<i64> {
    let text = std::str::from_utf8(digits).ok()?;
    if text.is_empty() || text == "-" {
        return None;
    }
    if !text
        .bytes()
        .enumerate()
        .all(|(i, b)| b.is_ascii_digit() || (i == 0 && b == b'-'))
    {
        return None;
    }
    text.parse::<i64>().ok()
}

/// Accumulates raw socket bytes and yields complete commands.
///
/// Trailing bytes of a partial command stay buffered between reads; the
/// internal buffer is compacted once the consumed prefix grows past half
/// its length.
pub struct RequestParser {
    buffer: BytesMut,
    position: usize,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::with_capacity(16 * 1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            position: 0,
        }
    }

    /// Feed data into the parser
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Parse the next complete command out of the buffered bytes.
    ///
    /// Returns `Ok(None)` when more data is needed. On a malformed
    /// command the buffered bytes are discarded (the stream is desynced
    /// past recovery) and the error is returned for the caller to turn
    /// into an error reply.
    pub fn next_command(&mut self) -> Result<Option<CommandArgs>, ParseError> {
        if self.position >= self.buffer.len() {
            self.compact();
            return Ok(None);
        }

        match parse_command(&self.buffer[self.position..]) {
            Ok((args, consumed)) => {
                self.position += consumed;
                if self.position > self.buffer.len() / 2 {
                    self.compact();
                }
                Ok(Some(args))
            }
            Err(e) if e.is_incomplete() => Ok(None),
            Err(e) => {
                self.buffer.clear();
                self.position = 0;
                Err(e)
            }
        }
    }

    /// Number of buffered bytes not yet parsed.
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.position
    }

    fn compact(&mut self) {
        let _ = self.buffer.split_to(self.position);
        self.position = 0;
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed server reply, one variant per RESP reply shape.
///
/// The enum is closed on purpose: serialization matches exhaustively, so
/// a new reply kind is a compile-time extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    NullBulk,
    Array(Vec<Bytes>),
    NullArray,
}

impl Reply {
    /// Encode into a fresh byte buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size_hint());
        self.write_to(&mut buf);
        buf
    }

    /// Append the wire encoding to `buf`. Pure, never fails.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::Simple(s) => {
                buf.push(b'+');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Error(e) => {
                buf.push(b'-');
                buf.extend_from_slice(e.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Integer(n) => {
                buf.push(b':');
                let mut num_buf = itoa::Buffer::new();
                buf.extend_from_slice(num_buf.format(*n).as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Bulk(s) => write_bulk(buf, s),
            Reply::NullBulk => {
                buf.extend_from_slice(b"$-1\r\n");
            }
            Reply::Array(elements) => {
                buf.push(b'*');
                let mut num_buf = itoa::Buffer::new();
                buf.extend_from_slice(num_buf.format(elements.len()).as_bytes());
                buf.extend_from_slice(b"\r\n");
                for element in elements {
                    write_bulk(buf, element);
                }
            }
            Reply::NullArray => {
                buf.extend_from_slice(b"*-1\r\n");
            }
        }
    }

    #[inline]
    fn encoded_size_hint(&self) -> usize {
        match self {
            Reply::Simple(s) => s.len() + 3,
            Reply::Error(e) => e.len() + 3,
            Reply::Integer(_) => 24,
            Reply::Bulk(s) => s.len() + 20,
            Reply::NullBulk | Reply::NullArray => 5,
            Reply::Array(elements) => {
                elements.iter().map(|e| e.len() + 20).sum::<usize>() + 10
            }
        }
    }
}

#[inline]
fn write_bulk(buf: &mut Vec<u8>, data: &[u8]) {
    buf.push(b'$');
    let mut num_buf = itoa::Buffer::new();
    buf.extend_from_slice(num_buf.format(data.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
}
