//! Line splitter for raw build-tool output.
//!
//! The build tool writes to a pipe and we read whatever the OS hands us, so
//! chunk boundaries fall anywhere: mid-line, between `\r` and `\n`, or in the
//! middle of a multi-byte character. [`LineSplitter`] buffers the trailing
//! partial line and yields complete logical lines with terminal escape
//! sequences removed.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// Longest partial line kept before it is emitted without a terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Escape sequences removed from every line: CSI sequences ending in a
/// letter (`ESC [ 1 ; 31 m`, `ESC [ 2 K`, `ESC [ 1 A`) and the two-byte
/// cursor-up / erase forms (`ESC A`, `ESC J`, `ESC K`, `ESC M`).
fn escape_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b[AJKM]").expect("valid terminal escape regex")
    })
}

/// Remove terminal escape sequences from a line.
///
/// Malformed sequences that do not match are left in place.
#[must_use]
pub fn strip_terminal_codes(line: &str) -> Cow<'_, str> {
    if !line.contains('\x1b') {
        return Cow::Borrowed(line);
    }
    escape_pattern().replace_all(line, "")
}

/// Length of the terminator starting at `pos` (`\n`, `\r\n` or bare `\r`).
///
/// A `\r` in the last byte is ambiguous (it may be the first half of
/// `\r\n`), so it is not resolved until more input arrives.
fn terminator_len(buffer: &[u8], pos: usize) -> Option<usize> {
    if buffer[pos] == b'\n' {
        return Some(1);
    }
    match buffer.get(pos + 1) {
        Some(b'\n') => Some(2),
        Some(_) => Some(1),
        None => None,
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    strip_terminal_codes(&text).into_owned()
}

/// Buffers partial lines across chunks.
///
/// The output is a pure function of the concatenated input: feeding a
/// stream in one chunk or split at any byte offset yields the same lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and iterate over the lines it completes.
    ///
    /// Lines are produced lazily; anything left unread stays buffered and is
    /// returned by the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.buffer.extend_from_slice(chunk);
        Lines { splitter: self }
    }

    /// End of stream: return every remaining line, including an
    /// unterminated tail.
    pub fn finish(&mut self) -> Vec<String> {
        let mut lines: Vec<String> = Lines { splitter: self }.collect();
        if !self.buffer.is_empty() {
            let mut tail = std::mem::take(&mut self.buffer);
            if tail.last() == Some(&b'\r') {
                tail.pop();
            }
            lines.push(decode_line(&tail));
        }
        lines
    }

    /// Bytes currently held for an incomplete line.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn drain_next_line(&mut self) -> Option<String> {
        let first_break = self
            .buffer
            .iter()
            .position(|&b| b == b'\n' || b == b'\r');
        match first_break {
            Some(pos) if pos <= MAX_LINE_BYTES => {
                let terminator = terminator_len(&self.buffer, pos)?;
                let line = decode_line(&self.buffer[..pos]);
                self.buffer.drain(..pos + terminator);
                Some(line)
            }
            _ if self.buffer.len() > MAX_LINE_BYTES => {
                tracing::warn!(
                    limit = MAX_LINE_BYTES,
                    "Output line exceeds limit; splitting without a terminator"
                );
                let line = decode_line(&self.buffer[..MAX_LINE_BYTES]);
                self.buffer.drain(..MAX_LINE_BYTES);
                Some(line)
            }
            _ => None,
        }
    }
}

/// Lazy iterator over the lines completed by a [`LineSplitter::feed`] call.
pub struct Lines<'a> {
    splitter: &'a mut LineSplitter,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.splitter.drain_next_line()
    }
}
