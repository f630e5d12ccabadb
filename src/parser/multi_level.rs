use super::{ParserCore, ParserSettings, ParserState};
use crate::decoder::{FixLenDecoder, RecordDecoder};
use crate::error::{ConfigError, InputError, ParseError, Result};
use crate::metadata::{RecordType, validate_pool};
use crate::policy::{ErrorCollector, RecordProblem};
use crate::reader::{InputReader, Next};
use crate::record::Record;
use crate::selector::{Lookahead, SelectorConfig, TypeSelector};
use log::trace;
use std::fmt;
use std::io::Read;

/// Parser for sources mixing records of several types.
///
/// For every record the parser marks the reader, reads a lookahead window of characters and
/// lets the selector classify it. The window doubles whenever the selector needs more data.
/// The reader is then reverted, the selector's record offset skipped, and the record decoded
/// with the chosen type.
///
/// Data no type matches is an error under the strict policy. Under the lenient policy it is
/// reported and the selector's recovery heuristic looks for the start of the next record.
pub struct MultiLevelParser {
    core: ParserCore,
    pool: Vec<RecordType>,
    selector: Box<dyn TypeSelector>,
    look_ahead: usize,
    window: Vec<char>,
    type_index: Option<usize>,
}

impl fmt::Debug for MultiLevelParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiLevelParser")
            .field("core", &self.core)
            .field("pool", &self.pool.len())
            .field("look_ahead", &self.look_ahead)
            .field("type_index", &self.type_index)
            .finish_non_exhaustive()
    }
}

enum Window {
    /// The window holds at least the requested characters.
    Filled,
    /// The input ended inside the window.
    AtEnd,
}

/// Extend `window` with characters from the cursor until it holds `want` characters.
///
/// Undecodable bytes enter the window as one replacement character each, so window offsets
/// must be skipped with [`InputReader::skip_chars_lossy`].
fn fill_window(reader: &mut InputReader, window: &mut Vec<char>, want: usize) -> Result<Window> {
    while window.len() < want {
        match reader.read_char_lossy()? {
            Next::Item(c) => window.push(c),
            Next::EndOfInput | Next::DecodingFailed => return Ok(Window::AtEnd),
            Next::BlockedByMark => {
                return Err(InputError::BlockedByMark {
                    capacity: reader.options().max_capacity,
                }
                .into());
            }
        }
    }
    Ok(Window::Filled)
}

impl MultiLevelParser {
    /// Create a parser over `pool`, initializing `selector` from `selector_config`.
    ///
    /// # Errors
    /// [`ConfigError`] for an invalid pool, selector configuration or charset.
    pub fn new(
        pool: Vec<RecordType>,
        mut selector: Box<dyn TypeSelector>,
        selector_config: &SelectorConfig,
        settings: ParserSettings,
    ) -> std::result::Result<Self, ConfigError> {
        validate_pool(&pool)?;
        let look_ahead = selector.init(&pool, selector_config)?.max(1);
        Ok(Self {
            core: ParserCore::new(&settings)?,
            pool,
            selector,
            look_ahead,
            window: Vec::with_capacity(look_ahead),
            type_index: None,
        })
    }

    /// Bind a new source. A replaced source is returned unless the parser releases sources.
    ///
    /// # Errors
    /// [`ParseError::Closed`] after [`close`](Self::close).
    pub fn set_data_source(&mut self, source: Box<dyn Read>) -> Result<Option<Box<dyn Read>>> {
        self.type_index = None;
        self.core.set_data_source(source)
    }

    /// Classify and decode the next record, `Ok(None)` at end of data.
    ///
    /// # Errors
    /// Under the strict policy malformed records and unknown record types; reader failures
    /// under both policies. Every error aborts the current source.
    pub fn get_next(&mut self) -> Result<Option<Record>> {
        self.core.check_open()?;
        match self.next_record() {
            Ok(record) => Ok(record),
            Err(e) => Err(self.core.fail(e)),
        }
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(type_index) = self.next_type()? else {
            return Ok(None);
        };
        let core = &mut self.core;
        let record = core
            .decoder
            .parse_next(&mut core.reader, type_index, &self.pool[type_index])?;
        if let Some(record) = &record {
            self.type_index = Some(type_index);
            core.collect(record);
        }
        Ok(record)
    }

    /// Classify the record at the cursor and move past the selector's record offset.
    ///
    /// Unknown spans fail under the strict policy and are recovered from under the lenient
    /// one. Returns `None` at end of data.
    fn next_type(&mut self) -> Result<Option<usize>> {
        loop {
            let start = self.core.reader.position();
            let Some(at_end) = self.classify()? else {
                return Ok(None);
            };

            let Some(type_index) = self.selector.next_record_type() else {
                if !self.core.policy().is_lenient() {
                    return Err(ParseError::UnknownRecordType { position: start });
                }
                self.core
                    .errors
                    .report(RecordProblem::UnknownRecordType { position: start });
                if self.recover(start, at_end)? {
                    continue;
                }
                return Ok(None);
            };

            let offset = self.selector.next_record_offset();
            self.core.reader.skip_chars_lossy(offset)?;
            return Ok(Some(type_index));
        }
    }

    /// Let the selector decide on the span at the cursor without consuming it.
    ///
    /// Returns `None` at a clean end of data, otherwise whether the window reached the end.
    fn classify(&mut self) -> Result<Option<bool>> {
        self.selector.reset();
        self.window.clear();
        let reader = &mut self.core.reader;
        reader.mark()?;
        let mut want = self.look_ahead;
        let at_end = loop {
            let at_end = matches!(fill_window(reader, &mut self.window, want)?, Window::AtEnd);
            if self.window.is_empty() && at_end {
                reader.revert()?;
                return Ok(None);
            }
            match self.selector.choose(&Lookahead::new(&self.window, at_end)) {
                Ok(()) => break at_end,
                Err(_) if at_end => break at_end,
                Err(_) => {
                    want *= 2;
                    trace!("selector needs more data, lookahead window grows to {want}");
                }
            }
        };
        reader.revert()?;
        Ok(Some(at_end))
    }

    /// Skip to the next plausible record start. `false` if the input ends first.
    fn recover(&mut self, start: u64, mut at_end: bool) -> Result<bool> {
        let reader = &mut self.core.reader;
        reader.mark()?;
        let mut want = self.window.len().max(self.look_ahead);
        self.window.clear();
        loop {
            at_end |= matches!(fill_window(reader, &mut self.window, want)?, Window::AtEnd);
            match self
                .selector
                .recover_to_next_record(&Lookahead::new(&self.window, at_end))
            {
                Ok(true) => {
                    let mut skipped = self.selector.next_record_offset();
                    reader.revert()?;
                    reader.skip_chars_lossy(skipped)?;
                    if reader.position() == start {
                        // the same span would be classified again
                        reader.skip_bytes(1)?;
                        skipped = skipped.max(1);
                    }
                    self.core.errors.report(RecordProblem::Skipped {
                        position: start,
                        skipped,
                    });
                    return Ok(true);
                }
                Ok(false) | Err(_) if at_end => {
                    reader.release_mark();
                    self.core.errors.report(RecordProblem::Skipped {
                        position: start,
                        skipped: self.window.len(),
                    });
                    return Ok(false);
                }
                Ok(false) => {
                    // a selector without a recovery heuristic gives up at once
                    reader.release_mark();
                    return Err(ParseError::Unrecoverable { position: start });
                }
                Err(_) => want *= 2,
            }
        }
    }

    /// Skip up to `count` records; returns how many were skipped.
    ///
    /// Every record is classified, since its length depends on its type, but its fields are
    /// not decoded.
    ///
    /// # Errors
    /// As [`get_next`](Self::get_next), except that field problems go unnoticed.
    pub fn skip(&mut self, count: usize) -> Result<usize> {
        self.core.check_open()?;
        match self.skip_records(count) {
            Ok(skipped) => Ok(skipped),
            Err(e) => Err(self.core.fail(e)),
        }
    }

    fn skip_records(&mut self, count: usize) -> Result<usize> {
        let mut skipped = 0;
        while skipped < count {
            let Some(type_index) = self.next_type()? else {
                break;
            };
            let core = &mut self.core;
            if core
                .decoder
                .skip(&mut core.reader, &self.pool[type_index], 1)?
                == 0
            {
                break;
            }
            self.type_index = Some(type_index);
            skipped += 1;
        }
        Ok(skipped)
    }

    /// Type index of the record last returned by [`get_next`](Self::get_next).
    #[must_use]
    pub fn type_index(&self) -> Option<usize> {
        self.type_index
    }

    #[must_use]
    pub fn pool(&self) -> &[RecordType] {
        &self.pool
    }

    /// Lookahead hint reported by the selector.
    #[must_use]
    pub fn look_ahead(&self) -> usize {
        self.look_ahead
    }

    /// Byte offset of the next record in the current source.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.core.reader.position()
    }

    /// Resume the freshly bound source at `position`.
    ///
    /// # Errors
    /// If reading already started or the parser is not open.
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        self.core.set_position(position)
    }

    /// Records emitted so far in the logical stream.
    #[must_use]
    pub fn record_index(&self) -> u64 {
        self.core.decoder.record_index()
    }

    pub fn set_record_index(&mut self, index: u64) {
        self.core.decoder.set_record_index(index);
    }

    #[must_use]
    pub fn errors(&self) -> &ErrorCollector {
        &self.core.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorCollector {
        &mut self.core.errors
    }

    #[must_use]
    pub fn state(&self) -> ParserState {
        self.core.state()
    }

    #[must_use]
    pub fn decoder(&self) -> &FixLenDecoder {
        &self.core.decoder
    }

    /// Decoder access for the character-mode toggles.
    pub fn decoder_mut(&mut self) -> &mut FixLenDecoder {
        &mut self.core.decoder
    }

    #[must_use]
    pub fn reader(&self) -> &InputReader {
        &self.core.reader
    }

    /// Close the parser. The source is returned unless the parser releases sources.
    pub fn close(&mut self) -> Option<Box<dyn Read>> {
        self.core.close()
    }
}
