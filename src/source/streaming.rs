use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::data::{Post, post_from_row};
use crate::errors::PipelineError;
use crate::source::RecordStream;

/// Record stream that reads the post document incrementally.
///
/// Only the bytes of the row currently being framed are held in
/// memory, so peak usage is a small constant multiple of one record's
/// size regardless of document length. Accepts the same two top-level
/// shapes as `BoundedSource`: a bare row array, or an export object
/// whose `rows` key carries the array (keys ahead of `rows` are
/// skipped without buffering).
///
/// Top-level structure is validated at construction, before any record
/// is yielded. A row that frames correctly but fails to parse is a
/// per-record error and the stream continues; truncated input is a
/// fatal parse error. The source owns its reader, so the handle is
/// released when the stream is dropped, exhausted or not.
pub struct StreamingSource<R: Read> {
    scanner: ByteScanner<BufReader<R>>,
    state: State,
    row_buf: Vec<u8>,
    yielded: usize,
}

#[derive(Debug, PartialEq)]
enum State {
    BeforeFirstRow,
    BetweenRows,
    Done,
}

impl<R: Read> StreamingSource<R> {
    /// Open a streaming source over any reader, validating the
    /// top-level document structure up front.
    pub fn from_reader(reader: R) -> Result<Self, PipelineError> {
        let mut scanner = ByteScanner::new(BufReader::new(reader));
        Self::seek_to_rows(&mut scanner)?;
        Ok(Self {
            scanner,
            state: State::BeforeFirstRow,
            row_buf: Vec::new(),
            yielded: 0,
        })
    }

    /// Position the scanner just inside the `[` of the row array.
    fn seek_to_rows(scanner: &mut ByteScanner<BufReader<R>>) -> Result<(), PipelineError> {
        match scanner.first_significant_byte()? {
            Some(b'[') => {
                scanner.advance();
                Ok(())
            }
            Some(b'{') => {
                scanner.advance();
                Self::seek_rows_key(scanner)
            }
            Some(other) => Err(PipelineError::Parse(format!(
                "expected a top-level array or export object, found '{}'",
                other as char
            ))),
            None => Err(PipelineError::Parse("document is empty".into())),
        }
    }

    /// Scan an export object's keys until `rows`, skipping the values
    /// of earlier keys without buffering them.
    fn seek_rows_key(scanner: &mut ByteScanner<BufReader<R>>) -> Result<(), PipelineError> {
        loop {
            match scanner.first_significant_byte()? {
                Some(b'"') => {}
                Some(b'}') => {
                    return Err(PipelineError::Parse(
                        "export object has no 'rows' array".into(),
                    ));
                }
                Some(other) => {
                    return Err(PipelineError::Parse(format!(
                        "expected an object key, found '{}'",
                        other as char
                    )));
                }
                None => return Err(PipelineError::Parse("unexpected end of document".into())),
            }
            let key = scanner.read_key()?;
            scanner.expect_significant(b':')?;
            if key == b"rows" {
                scanner.expect_significant(b'[')?;
                return Ok(());
            }
            scanner.consume_value(None)?;
            match scanner.first_significant_byte()? {
                Some(b',') => scanner.advance(),
                Some(b'}') => {
                    return Err(PipelineError::Parse(
                        "export object has no 'rows' array".into(),
                    ));
                }
                Some(other) => {
                    return Err(PipelineError::Parse(format!(
                        "expected ',' or '}}' after object value, found '{}'",
                        other as char
                    )));
                }
                None => return Err(PipelineError::Parse("unexpected end of document".into())),
            }
        }
    }

    /// Records yielded so far. Becomes the final count at exhaustion.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Frame the next row's bytes and parse them.
    fn next_row(&mut self) -> Result<Option<Post>, PipelineError> {
        match self.state {
            State::Done => return Ok(None),
            State::BeforeFirstRow => match self.scanner.first_significant_byte()? {
                Some(b']') => {
                    self.finish();
                    return Ok(None);
                }
                Some(_) => {}
                None => {
                    return Err(PipelineError::Parse("unexpected end of document".into()));
                }
            },
            State::BetweenRows => match self.scanner.first_significant_byte()? {
                Some(b',') => self.scanner.advance(),
                Some(b']') => {
                    self.finish();
                    return Ok(None);
                }
                Some(other) => {
                    return Err(PipelineError::Parse(format!(
                        "expected ',' or ']' between rows, found '{}'",
                        other as char
                    )));
                }
                None => {
                    return Err(PipelineError::Parse("unexpected end of document".into()));
                }
            },
        }

        self.row_buf.clear();
        self.scanner.consume_value(Some(&mut self.row_buf))?;
        self.state = State::BetweenRows;
        let row: Value = serde_json::from_slice(&self.row_buf)
            .map_err(|err| PipelineError::Record(err.to_string()))?;
        post_from_row(row).map(Some)
    }

    fn finish(&mut self) {
        // Consume the closing bracket; anything after the row array
        // (trailing export keys) is irrelevant to this stream.
        self.scanner.advance();
        self.state = State::Done;
        debug!(records = self.yielded, "streaming source exhausted");
    }
}

// The underlying reader has no `Debug` bound, so show progress state
// instead of deriving.
impl<R: Read> fmt::Debug for StreamingSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingSource")
            .field("state", &self.state)
            .field("yielded", &self.yielded)
            .finish_non_exhaustive()
    }
}

impl StreamingSource<File> {
    /// Open a streaming source over a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        Self::from_reader(File::open(path)?)
    }
}

impl<R: Read + Send> RecordStream for StreamingSource<R> {
    fn total(&self) -> Option<usize> {
        // Unknown until exhaustion in streaming mode.
        None
    }

    fn next_record(&mut self) -> Option<Result<Post, PipelineError>> {
        match self.next_row() {
            Ok(Some(post)) => {
                self.yielded += 1;
                Some(Ok(post))
            }
            Ok(None) => None,
            Err(err) => {
                if !err.is_record_local() {
                    // Fatal: framing is unrecoverable past this point.
                    self.state = State::Done;
                }
                Some(Err(err))
            }
        }
    }
}

/// Minimal byte-level JSON framer over an `io::Read`.
///
/// Knows just enough JSON to find value boundaries: strings with
/// escapes, bracket depth, and atom runs. Actual parsing of a framed
/// row is delegated to `serde_json`.
struct ByteScanner<R: Read> {
    reader: R,
    peeked: Option<u8>,
}

impl<R: Read> ByteScanner<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            peeked: None,
        }
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, PipelineError> {
        if self.peeked.is_none() {
            let mut byte = [0u8; 1];
            self.peeked = match self.reader.read(&mut byte)? {
                0 => None,
                _ => Some(byte[0]),
            };
        }
        Ok(self.peeked)
    }

    fn next_byte(&mut self) -> Result<Option<u8>, PipelineError> {
        let byte = self.peek_byte()?;
        self.peeked = None;
        Ok(byte)
    }

    /// Drop the current peeked byte.
    fn advance(&mut self) {
        self.peeked = None;
    }

    /// Peek the first byte that is not JSON whitespace.
    fn first_significant_byte(&mut self) -> Result<Option<u8>, PipelineError> {
        loop {
            match self.peek_byte()? {
                Some(b' ' | b'\t' | b'\n' | b'\r') => self.advance(),
                other => return Ok(other),
            }
        }
    }

    /// Consume the next significant byte, requiring it to be `expected`.
    fn expect_significant(&mut self, expected: u8) -> Result<(), PipelineError> {
        match self.first_significant_byte()? {
            Some(byte) if byte == expected => {
                self.advance();
                Ok(())
            }
            Some(other) => Err(PipelineError::Parse(format!(
                "expected '{}', found '{}'",
                expected as char, other as char
            ))),
            None => Err(PipelineError::Parse("unexpected end of document".into())),
        }
    }

    /// Read an object key, returning its raw bytes without the quotes.
    /// The opening quote must be the current peeked byte.
    fn read_key(&mut self) -> Result<Vec<u8>, PipelineError> {
        self.advance();
        let mut key = Vec::new();
        self.consume_string_tail(Some(&mut key))?;
        // Drop the closing quote captured by the string scan.
        key.pop();
        Ok(key)
    }

    /// Consume exactly one JSON value, optionally capturing its bytes.
    ///
    /// Leaves the byte after the value (`,`, `]`, `}`, whitespace, or
    /// EOF) unconsumed, so the caller keeps control of framing. Passing
    /// `None` skips the value without buffering it.
    fn consume_value(&mut self, mut sink: Option<&mut Vec<u8>>) -> Result<(), PipelineError> {
        let first = match self.first_significant_byte()? {
            Some(byte) => byte,
            None => return Err(PipelineError::Parse("unexpected end of document".into())),
        };
        match first {
            b'"' => {
                self.advance();
                push_byte(&mut sink, b'"');
                self.consume_string_tail(sink.as_deref_mut())
            }
            b'{' | b'[' => self.consume_container(sink),
            _ => self.consume_atom(sink),
        }
    }

    /// Consume a string after its opening quote, through the closing
    /// quote (which is captured when a sink is present).
    fn consume_string_tail(
        &mut self,
        mut sink: Option<&mut Vec<u8>>,
    ) -> Result<(), PipelineError> {
        loop {
            let byte = self
                .next_byte()?
                .ok_or_else(|| PipelineError::Parse("unterminated string".into()))?;
            push_byte(&mut sink, byte);
            match byte {
                b'"' => return Ok(()),
                b'\\' => {
                    let escaped = self
                        .next_byte()?
                        .ok_or_else(|| PipelineError::Parse("unterminated string".into()))?;
                    push_byte(&mut sink, escaped);
                }
                _ => {}
            }
        }
    }

    /// Consume a `{...}` or `[...]` container by bracket depth,
    /// ignoring brackets inside strings.
    fn consume_container(&mut self, mut sink: Option<&mut Vec<u8>>) -> Result<(), PipelineError> {
        let mut depth = 0usize;
        loop {
            let byte = self
                .next_byte()?
                .ok_or_else(|| PipelineError::Parse("unexpected end of document".into()))?;
            push_byte(&mut sink, byte);
            match byte {
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                b'"' => self.consume_string_tail(sink.as_deref_mut())?,
                _ => {}
            }
        }
    }

    /// Consume a number/true/false/null atom, stopping at whitespace,
    /// a structural delimiter, or EOF without consuming it.
    fn consume_atom(&mut self, mut sink: Option<&mut Vec<u8>>) -> Result<(), PipelineError> {
        loop {
            match self.peek_byte()? {
                Some(b' ' | b'\t' | b'\n' | b'\r' | b',' | b']' | b'}') | None => return Ok(()),
                Some(byte) => {
                    self.advance();
                    push_byte(&mut sink, byte);
                }
            }
        }
    }
}

fn push_byte(sink: &mut Option<&mut Vec<u8>>, byte: u8) {
    if let Some(buf) = sink.as_deref_mut() {
        buf.push(byte);
    }
}
