//! Dual-mode buffered input reader with mark / revert.
//!
//! [`InputReader`] presents one forward-moving cursor over a byte source. The same cursor can
//! be advanced byte by byte ([`read_byte`](InputReader::read_byte)) or character by character
//! ([`read_char`](InputReader::read_char)), so a record may mix decoded text fields with raw
//! binary fields without re-reading the stream.
//!
//! # Buffering
//!
//! The reader owns a single byte buffer. Decoded characters are a derived cache over that
//! buffer: every cached character remembers the byte span it was decoded from, which keeps
//! byte positions exact and lets the character view follow the byte view after raw reads.
//! The cache is rebuilt lazily whenever the cursor leaves the decoded region.
//!
//! Bytes before the cursor are discarded on refill, except for
//! - the span from an active mark to the cursor (needed by `revert` and sequence extraction)
//! - the configured `lookback` (guaranteed room for negative skips)
//!
//! When the protected span no longer fits into `max_capacity`, reads report
//! [`Next::BlockedByMark`]. This is a limits problem, not a transient condition.
//!
//! # Example
//!
//! ```
//! use flatbeam::reader::{InputReader, Next};
//! # fn main() -> Result<(), flatbeam::error::InputError> {
//! let mut reader = InputReader::new(encoding_rs::UTF_8);
//! reader.set_input_source(Box::new(std::io::Cursor::new("Käse".as_bytes().to_vec())));
//!
//! reader.mark()?;
//! assert_eq!(reader.read_char()?, Next::Item('K'));
//! assert_eq!(reader.read_char()?, Next::Item('ä'));
//! assert_eq!(reader.position(), 3);
//! reader.revert()?;
//! assert_eq!(reader.read_byte()?, Next::Item(b'K'));
//! # Ok(())
//! # }
//! ```

use crate::error::InputError;
use encoding_rs::{Decoder, DecoderResult, Encoding};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{ErrorKind, Read};

/// Lower bound for the refill size and for the room left beside the lookback.
pub const MIN_READ_SIZE: usize = 512;

/// Outcome of a single read from an [`InputReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next<T> {
    /// The next byte or character.
    Item(T),
    /// The source is exhausted and every buffered byte was consumed.
    EndOfInput,
    /// The bytes at the cursor are not valid in the configured charset.
    /// The cursor is left at the start of the offending sequence.
    DecodingFailed,
    /// The span protected by the active mark fills the maximum buffer capacity.
    BlockedByMark,
}

/// Buffer limits of an [`InputReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Bytes requested from the source per refill.
    pub initial_capacity: usize,
    /// Upper bound for the buffer, including the span protected by a mark.
    pub max_capacity: usize,
    /// Consumed bytes always kept for negative skips, even without a mark.
    pub lookback: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 8 * 1024,
            max_capacity: 16 * 1024 * 1024,
            lookback: 0,
        }
    }
}

impl ReaderOptions {
    fn normalized(self) -> Self {
        let initial_capacity = self.initial_capacity.max(MIN_READ_SIZE);
        let max_capacity = self
            .max_capacity
            .max(initial_capacity)
            .max(self.lookback + MIN_READ_SIZE);
        Self {
            initial_capacity,
            max_capacity,
            lookback: self.lookback,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DecodedChar {
    ch: char,
    /// Buffer index of the first byte of the sequence.
    start: usize,
    /// Buffer index one past the last byte of the sequence.
    end: usize,
}

enum Fill {
    Data,
    Eof,
    Blocked,
}

/// A buffered byte / character cursor over a [`Read`] source.
pub struct InputReader {
    source: Option<Box<dyn Read>>,
    encoding: &'static Encoding,
    options: ReaderOptions,

    buf: Vec<u8>,
    /// Cursor into `buf`.
    pos: usize,
    /// Absolute stream offset of `buf[0]`.
    base: u64,
    mark: Option<usize>,
    eof: bool,
    started: bool,

    decoder: Decoder,
    chars: Vec<DecodedChar>,
    char_idx: usize,
    /// Buffer index where the next decoded character will start.
    pending_start: usize,
    /// Buffer index up to which bytes were fed to the decoder.
    decoded_end: usize,
    scratch: String,
}

impl fmt::Debug for InputReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputReader")
            .field("charset", &self.encoding.name())
            .field("position", &self.position())
            .field("buffered", &(self.buf.len() - self.pos))
            .field("mark", &self.mark.map(|m| self.base + m as u64))
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl InputReader {
    /// Create an unbound reader decoding characters with `encoding`.
    #[must_use]
    pub fn new(encoding: &'static Encoding) -> Self {
        Self::with_options(encoding, ReaderOptions::default())
    }

    /// Create an unbound reader with explicit buffer limits.
    #[must_use]
    pub fn with_options(encoding: &'static Encoding, options: ReaderOptions) -> Self {
        let options = options.normalized();
        Self {
            source: None,
            encoding,
            options,
            buf: Vec::with_capacity(options.initial_capacity),
            pos: 0,
            base: 0,
            mark: None,
            eof: false,
            started: false,
            decoder: encoding.new_decoder_without_bom_handling(),
            chars: Vec::new(),
            char_idx: 0,
            pending_start: 0,
            decoded_end: 0,
            scratch: String::new(),
        }
    }

    /// The charset used by [`read_char`](Self::read_char).
    #[must_use]
    pub fn charset(&self) -> &'static Encoding {
        self.encoding
    }

    #[must_use]
    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    /// Bind the reader to a new source.
    ///
    /// Clears the buffer, invalidates any mark and resets the position to 0. The previously
    /// bound source is handed back; dropping it closes it.
    pub fn set_input_source(&mut self, source: Box<dyn Read>) -> Option<Box<dyn Read>> {
        let previous = self.source.replace(source);
        self.reset_buffers();
        debug!("input reader bound to a new source ({})", self.encoding.name());
        previous
    }

    /// Unbind and return the current source.
    pub fn take_source(&mut self) -> Option<Box<dyn Read>> {
        self.reset_buffers();
        self.source.take()
    }

    #[must_use]
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    fn reset_buffers(&mut self) {
        self.buf.clear();
        self.pos = 0;
        self.base = 0;
        self.mark = None;
        self.eof = false;
        self.started = false;
        self.resync_decoder();
    }

    /// Byte offset of the cursor from the start of the source.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Resume at a previously recorded byte offset.
    ///
    /// Only legal before anything was read from the current source. The skipped bytes are
    /// read and discarded; a position past the end of the source is accepted and the next
    /// read reports end of input.
    ///
    /// # Errors
    /// [`InputError::PositionLocked`] once reading started, [`InputError::NoSource`] if
    /// unbound, [`InputError::Io`] if discarding fails.
    pub fn set_position(&mut self, position: u64) -> Result<(), InputError> {
        if self.started || self.position() != 0 {
            return Err(InputError::PositionLocked(self.position()));
        }
        let source = self.source.as_mut().ok_or(InputError::NoSource)?;
        let mut remaining = position;
        let mut discard = vec![0u8; self.options.initial_capacity];
        while remaining > 0 {
            let want = usize::try_from(remaining).map_or(discard.len(), |r| r.min(discard.len()));
            match source.read(&mut discard[..want]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => remaining -= n as u64,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.base = position;
        debug!("input reader moved to byte {position}");
        Ok(())
    }

    /// `true` once the source is exhausted and no unread bytes are buffered.
    ///
    /// Exhaustion is only observed by a read, so this can be `false` right before a read
    /// returns [`Next::EndOfInput`].
    #[must_use]
    pub fn is_end_of_input(&self) -> bool {
        self.eof && self.pos == self.buf.len()
    }

    /// Number of unread bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn require_source(&self) -> Result<(), InputError> {
        if self.source.is_none() {
            return Err(InputError::NoSource);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Buffer management
    // ------------------------------------------------------------------

    fn fill(&mut self) -> Result<Fill, InputError> {
        if self.eof {
            return Ok(Fill::Eof);
        }
        let mut keep_from = self.pos.saturating_sub(self.options.lookback);
        if let Some(mark) = self.mark {
            keep_from = keep_from.min(mark);
        }
        if keep_from > 0 {
            self.discard_front(keep_from);
        }

        let room = self.options.max_capacity.saturating_sub(self.buf.len());
        if room == 0 {
            trace!(
                "refill blocked: {} bytes protected, capacity {}",
                self.buf.len(),
                self.options.max_capacity
            );
            return Ok(Fill::Blocked);
        }
        let chunk = self.options.initial_capacity.min(room);

        let Some(source) = self.source.as_mut() else {
            return Err(InputError::NoSource);
        };
        let len = self.buf.len();
        self.buf.resize(len + chunk, 0);
        let read = loop {
            match source.read(&mut self.buf[len..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.buf.truncate(len);
                    return Err(e.into());
                }
            }
        };
        self.buf.truncate(len + read);
        if read == 0 {
            trace!("source exhausted at byte {}", self.base + len as u64);
            self.eof = true;
            return Ok(Fill::Eof);
        }
        trace!("refilled {read} bytes at byte {}", self.base + len as u64);
        Ok(Fill::Data)
    }

    /// Drop the first `count` buffered bytes and shift every index accordingly.
    fn discard_front(&mut self, count: usize) {
        self.buf.drain(..count);
        self.base += count as u64;
        self.pos -= count;
        self.mark = self.mark.map(|m| m - count);

        if self.pending_start < count || self.decoded_end < count {
            self.resync_decoder();
            return;
        }
        let dropped = self.chars.partition_point(|c| c.start < count);
        self.chars.drain(..dropped);
        self.char_idx = self.char_idx.saturating_sub(dropped);
        for c in &mut self.chars {
            c.start -= count;
            c.end -= count;
        }
        self.pending_start -= count;
        self.decoded_end -= count;
        trace!("compacted {count} bytes, {} buffered", self.buf.len());
    }

    /// Grow the read-ahead window until `count` unread bytes are buffered or the source ends.
    ///
    /// Returns the number of unread bytes available, at most `count`.
    ///
    /// # Errors
    /// [`InputError::BlockedByMark`] if the window cannot grow any further,
    /// [`InputError::NoSource`] or [`InputError::Io`] otherwise.
    pub fn ensure_available(&mut self, count: usize) -> Result<usize, InputError> {
        self.require_source()?;
        self.started = true;
        while self.buf.len() - self.pos < count {
            match self.fill()? {
                Fill::Data => {}
                Fill::Eof => break,
                Fill::Blocked => {
                    return Err(InputError::BlockedByMark {
                        capacity: self.options.max_capacity,
                    });
                }
            }
        }
        Ok((self.buf.len() - self.pos).min(count))
    }

    /// Consume up to `count` buffered bytes.
    ///
    /// Call [`ensure_available`](Self::ensure_available) first to pull them from the source.
    pub fn take_bytes(&mut self, count: usize) -> Vec<u8> {
        let end = (self.pos + count).min(self.buf.len());
        let bytes = self.buf[self.pos..end].to_vec();
        self.pos = end;
        bytes
    }

    // ------------------------------------------------------------------
    // Byte view
    // ------------------------------------------------------------------

    /// Read the next raw byte.
    ///
    /// # Errors
    /// [`InputError::NoSource`] if unbound, [`InputError::Io`] if the source fails.
    pub fn read_byte(&mut self) -> Result<Next<u8>, InputError> {
        self.require_source()?;
        self.started = true;
        if self.pos == self.buf.len() {
            match self.fill()? {
                Fill::Data => {}
                Fill::Eof => return Ok(Next::EndOfInput),
                Fill::Blocked => return Ok(Next::BlockedByMark),
            }
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(Next::Item(byte))
    }

    /// Skip `count` bytes forward, or `-count` bytes backward.
    ///
    /// Backward skips stop at the active mark or the oldest retained byte. Returns the
    /// signed number of bytes actually skipped.
    ///
    /// # Errors
    /// [`InputError::BlockedByMark`] if the mark prevents further buffering.
    pub fn skip_bytes(&mut self, count: isize) -> Result<isize, InputError> {
        self.started = true;
        if count < 0 {
            let floor = self.mark.unwrap_or(0);
            let back = count.unsigned_abs().min(self.pos - floor);
            self.pos -= back;
            return Ok(-(back as isize));
        }
        self.require_source()?;
        let wanted = count.unsigned_abs();
        let mut done = 0;
        while done < wanted {
            if self.pos == self.buf.len() {
                match self.fill()? {
                    Fill::Data => {}
                    Fill::Eof => break,
                    Fill::Blocked => {
                        return Err(InputError::BlockedByMark {
                            capacity: self.options.max_capacity,
                        });
                    }
                }
            }
            let step = (wanted - done).min(self.buf.len() - self.pos);
            self.pos += step;
            done += step;
        }
        Ok(done as isize)
    }

    // ------------------------------------------------------------------
    // Character view
    // ------------------------------------------------------------------

    fn resync_decoder(&mut self) {
        self.chars.clear();
        self.char_idx = 0;
        self.decoder = self.encoding.new_decoder_without_bom_handling();
        self.pending_start = self.pos;
        self.decoded_end = self.pos;
    }

    /// Point the character cursor at `pos`, rebuilding the cache if `pos` is not a cached
    /// character boundary.
    fn sync_char_cursor(&mut self) {
        if self.is_char_boundary_at(self.char_idx) {
            return;
        }
        let idx = self.chars.partition_point(|c| c.start < self.pos);
        if self.is_char_boundary_at(idx) {
            self.char_idx = idx;
        } else {
            self.resync_decoder();
        }
    }

    fn is_char_boundary_at(&self, idx: usize) -> bool {
        match self.chars.get(idx) {
            Some(c) => c.start == self.pos,
            None => idx == self.chars.len() && self.pending_start == self.pos,
        }
    }

    /// Append whatever the decoder just produced to the cache.
    fn push_decoded(&mut self) {
        if self.scratch.is_empty() {
            return;
        }
        let end = self.decoded_end;
        let mut start = self.pending_start;
        for ch in self.scratch.chars() {
            self.chars.push(DecodedChar { ch, start, end });
            start = end;
        }
        self.pending_start = end;
    }

    fn reserve_scratch(&mut self, input_len: usize) {
        self.scratch.clear();
        let needed = self
            .decoder
            .max_utf8_buffer_length_without_replacement(input_len)
            .unwrap_or(16);
        self.scratch.reserve(needed.max(4));
    }

    /// Feed one more buffered byte to the decoder.
    fn decode_next_byte(&mut self) -> Option<Next<char>> {
        self.reserve_scratch(1);
        let at = self.decoded_end;
        let (result, read) = self.decoder.decode_to_string_without_replacement(
            &self.buf[at..=at],
            &mut self.scratch,
            false,
        );
        self.decoded_end += read;
        match result {
            DecoderResult::Malformed(_, _) => {
                self.resync_decoder();
                Some(Next::DecodingFailed)
            }
            DecoderResult::InputEmpty | DecoderResult::OutputFull => {
                self.push_decoded();
                None
            }
        }
    }

    /// Flush the decoder at end of input.
    fn finish_decoding(&mut self) -> Option<Next<char>> {
        self.reserve_scratch(0);
        let (result, _) =
            self.decoder
                .decode_to_string_without_replacement(&[], &mut self.scratch, true);
        if let DecoderResult::Malformed(_, _) = result {
            self.resync_decoder();
            return Some(Next::DecodingFailed);
        }
        if self.scratch.is_empty() {
            self.pos = self.decoded_end;
            self.pending_start = self.decoded_end;
            self.char_idx = self.chars.len();
            return Some(Next::EndOfInput);
        }
        self.push_decoded();
        None
    }

    /// Decode and return the next character.
    ///
    /// The position advances by the number of bytes the character occupies.
    ///
    /// # Errors
    /// [`InputError::NoSource`] if unbound, [`InputError::Io`] if the source fails.
    pub fn read_char(&mut self) -> Result<Next<char>, InputError> {
        self.require_source()?;
        self.started = true;
        self.sync_char_cursor();
        loop {
            if let Some(c) = self.chars.get(self.char_idx).copied() {
                self.char_idx += 1;
                self.pos = c.end;
                return Ok(Next::Item(c.ch));
            }
            if self.eof && self.pos == self.buf.len() {
                return Ok(Next::EndOfInput);
            }
            if self.decoded_end == self.buf.len() {
                match self.fill()? {
                    Fill::Data => continue,
                    Fill::Blocked => return Ok(Next::BlockedByMark),
                    Fill::Eof => {
                        if let Some(outcome) = self.finish_decoding() {
                            return Ok(outcome);
                        }
                        continue;
                    }
                }
            }
            if let Some(outcome) = self.decode_next_byte() {
                return Ok(outcome);
            }
        }
    }

    /// Skip `count` characters forward, or `-count` characters backward.
    ///
    /// Forward skips stop at end of input or at undecodable bytes. Backward skips stop at
    /// the active mark and at the oldest cached character. Returns the signed number of
    /// characters actually skipped.
    ///
    /// # Errors
    /// [`InputError::BlockedByMark`] if the mark prevents further buffering.
    pub fn skip_chars(&mut self, count: isize) -> Result<isize, InputError> {
        if count < 0 {
            self.started = true;
            self.sync_char_cursor();
            let floor = self.mark.unwrap_or(0);
            let first = self.chars.partition_point(|c| c.start < floor);
            let back = count.unsigned_abs().min(self.char_idx.saturating_sub(first));
            if back > 0 {
                self.char_idx -= back;
                self.pos = self.chars[self.char_idx].start;
            }
            return Ok(-(back as isize));
        }
        let mut done = 0;
        while done < count {
            match self.read_char()? {
                Next::Item(_) => done += 1,
                Next::EndOfInput | Next::DecodingFailed => break,
                Next::BlockedByMark => {
                    return Err(InputError::BlockedByMark {
                        capacity: self.options.max_capacity,
                    });
                }
            }
        }
        Ok(done)
    }

    /// Like [`read_char`](Self::read_char), but consumes one undecodable byte and returns it
    /// as [`char::REPLACEMENT_CHARACTER`]. Never returns [`Next::DecodingFailed`].
    ///
    /// # Errors
    /// As [`read_char`](Self::read_char).
    pub fn read_char_lossy(&mut self) -> Result<Next<char>, InputError> {
        match self.read_char()? {
            Next::DecodingFailed => {
                if self.skip_bytes(1)? == 0 {
                    return Ok(Next::EndOfInput);
                }
                Ok(Next::Item(char::REPLACEMENT_CHARACTER))
            }
            other => Ok(other),
        }
    }

    /// Skip `count` characters forward in the units of
    /// [`read_char_lossy`](Self::read_char_lossy): every undecodable byte counts as one
    /// character. Stops only at end of input. Returns the number of characters skipped.
    ///
    /// # Errors
    /// [`InputError::BlockedByMark`] if the mark prevents further buffering.
    pub fn skip_chars_lossy(&mut self, count: usize) -> Result<usize, InputError> {
        let mut done = 0;
        while done < count {
            match self.read_char_lossy()? {
                Next::Item(_) => done += 1,
                Next::EndOfInput | Next::DecodingFailed => break,
                Next::BlockedByMark => {
                    return Err(InputError::BlockedByMark {
                        capacity: self.options.max_capacity,
                    });
                }
            }
        }
        Ok(done)
    }

    // ------------------------------------------------------------------
    // Mark handling
    // ------------------------------------------------------------------

    /// Record the current position as the replay point.
    ///
    /// # Errors
    /// [`InputError::MarkAlreadySet`] if a mark is outstanding.
    pub fn mark(&mut self) -> Result<(), InputError> {
        if let Some(mark) = self.mark {
            return Err(InputError::MarkAlreadySet(self.base + mark as u64));
        }
        self.mark = Some(self.pos);
        Ok(())
    }

    #[must_use]
    pub fn has_mark(&self) -> bool {
        self.mark.is_some()
    }

    /// Move the cursor back to the mark and release it.
    ///
    /// # Errors
    /// [`InputError::NoMark`] if no mark is set.
    pub fn revert(&mut self) -> Result<(), InputError> {
        let mark = self.mark.take().ok_or(InputError::NoMark)?;
        self.pos = mark;
        self.sync_char_cursor();
        Ok(())
    }

    /// Release the mark without moving the cursor.
    pub fn release_mark(&mut self) {
        self.mark = None;
    }

    /// Bytes from the mark to `position + relative_end`, releasing the mark.
    ///
    /// `relative_end` is clamped to values `<= 0`; `-2` drops the last two consumed bytes
    /// from the sequence.
    ///
    /// # Errors
    /// [`InputError::NoMark`] if no mark is set.
    pub fn byte_sequence(&mut self, relative_end: isize) -> Result<Vec<u8>, InputError> {
        let mark = self.mark.take().ok_or(InputError::NoMark)?;
        let back = relative_end.min(0).unsigned_abs();
        let end = self.pos.saturating_sub(back).max(mark);
        Ok(self.buf[mark..end].to_vec())
    }

    /// Characters from the mark to `position + relative_end`, releasing the mark.
    ///
    /// `relative_end` counts characters and is clamped to values `<= 0`.
    ///
    /// # Errors
    /// [`InputError::NoMark`] if no mark is set, [`InputError::Malformed`] if the marked
    /// span was consumed as raw bytes and does not decode.
    pub fn char_sequence(&mut self, relative_end: isize) -> Result<String, InputError> {
        let mark = self.mark.take().ok_or(InputError::NoMark)?;
        let back = relative_end.min(0).unsigned_abs();

        self.sync_char_cursor();
        let first = self.chars.partition_point(|c| c.start < mark);
        let covered = self.chars.get(first).is_some_and(|c| c.start == mark)
            || (first == self.chars.len() && self.pending_start == mark);
        if covered && first <= self.char_idx {
            let end = self.char_idx.saturating_sub(back).max(first);
            return Ok(self.chars[first..end].iter().map(|c| c.ch).collect());
        }

        let text = crate::charset::decode_strict(self.encoding, &self.buf[mark..self.pos])
            .ok_or(InputError::Malformed {
                charset: self.encoding.name(),
            })?;
        let count = text.chars().count();
        Ok(text.chars().take(count.saturating_sub(back)).collect())
    }
}
