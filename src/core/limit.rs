//! Purpose: Impose a byte ceiling on a request-body reader.
//! Exports: `LimitedReader`, `LimitExceeded`.
//! Role: First layer of the strict decoder; bounds memory per request.
//! Invariants: `consumed()` never exceeds the ceiling; bytes past it are never handed out.
//! Invariants: Once the ceiling trips, every later read fails with `LimitExceeded`.
//! Notes: Byte counts double as parser offsets when the parser reads unbuffered.
use std::error::Error as StdError;
use std::fmt;
use std::io::{self, Read};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LimitExceeded {
    pub limit_bytes: u64,
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body exceeds the {} byte limit", self.limit_bytes)
    }
}

impl StdError for LimitExceeded {}

#[derive(Debug)]
pub struct LimitedReader<R> {
    inner: R,
    limit_bytes: u64,
    consumed: u64,
    exceeded: bool,
    saw_content: bool,
}

impl<R: Read> LimitedReader<R> {
    pub fn new(inner: R, limit_bytes: u64) -> Self {
        Self {
            inner,
            limit_bytes,
            consumed: 0,
            exceeded: false,
            saw_content: false,
        }
    }

    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    /// Bytes handed to the caller so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn exceeded(&self) -> bool {
        self.exceeded
    }

    /// Whether any byte other than JSON whitespace has been read.
    pub fn saw_content(&self) -> bool {
        self.saw_content
    }

    /// Discards the rest of the stream, reading at most up to the ceiling,
    /// and reports whether the body turned out to be larger than allowed.
    pub fn drain_exceeds_limit(&mut self) -> bool {
        if !self.exceeded {
            let _ = io::copy(self, &mut io::sink());
        }
        self.exceeded
    }

    fn limit_error(&self) -> io::Error {
        io::Error::other(LimitExceeded {
            limit_bytes: self.limit_bytes,
        })
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.exceeded {
            return Err(self.limit_error());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let remaining = self.limit_bytes.saturating_sub(self.consumed);
        if remaining == 0 {
            // At the ceiling: only a clean EOF is acceptable.
            let mut probe = [0u8; 1];
            if self.inner.read(&mut probe)? == 0 {
                return Ok(0);
            }
            self.exceeded = true;
            return Err(self.limit_error());
        }

        let max = usize::try_from(remaining).map_or(buf.len(), |remaining| remaining.min(buf.len()));
        let n = self.inner.read(&mut buf[..max])?;
        self.consumed += n as u64;
        if !self.saw_content && buf[..n].iter().any(|byte| !is_json_whitespace(*byte)) {
            self.saw_content = true;
        }
        Ok(n)
    }
}

fn is_json_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}
