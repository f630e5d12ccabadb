//! Parser façades.
//!
//! A parser binds an [`InputReader`] and a [`FixLenDecoder`] to one data source at a time and
//! hands out decoded records:
//! - [`FixLenParser`] - every record has the same type
//! - [`MultiLevelParser`] - a [`TypeSelector`](crate::selector::TypeSelector) classifies each
//!   record against a metadata pool
//!
//! # Life cycle
//!
//! ```text
//! Unopened --set_data_source--> Open --close--> Closed
//!                                 |
//!                                 +--fatal error--> Aborted --set_data_source--> Open
//! ```
//!
//! Switching sources keeps the record counter unless
//! [`ParserSettings::reset_counter_on_source_change`] is set: the counter numbers records of
//! the logical stream, which may span several physical sources.
//!
//! With [`ParserSettings::release_data_source`] set, a replaced or closed source is dropped
//! (and thereby closed) by the parser. Otherwise it is handed back to the caller.

mod fixlen;
mod multi_level;

pub use fixlen::FixLenParser;
pub use multi_level::MultiLevelParser;

use crate::charset;
use crate::decoder::{DecoderMode, DecoderOptions, FixLenDecoder, RecordDecoder};
use crate::error::{ConfigError, ParseError, Result};
use crate::policy::{ErrorCollector, ExceptionPolicy};
use crate::reader::{InputReader, ReaderOptions};
use crate::record::Record;
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Where a parser stands in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserState {
    /// No source bound yet.
    Unopened,
    /// Bound to a source.
    Open,
    /// Terminal; no further source can be bound.
    Closed,
    /// A fatal error stopped the parse of the current source.
    Aborted,
}

/// Settings shared by the parser façades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Charset label; UTF-8 if absent.
    pub charset: Option<String>,
    pub mode: DecoderMode,
    pub policy: ExceptionPolicy,
    pub decoder: DecoderOptions,
    pub reader: ReaderOptions,
    /// Drop replaced and closed sources instead of handing them back.
    pub release_data_source: bool,
    /// Restart record numbering for every new source.
    pub reset_counter_on_source_change: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            charset: None,
            mode: DecoderMode::default(),
            policy: ExceptionPolicy::default(),
            decoder: DecoderOptions::default(),
            reader: ReaderOptions::default(),
            release_data_source: true,
            reset_counter_on_source_change: false,
        }
    }
}

impl ParserSettings {
    #[must_use]
    pub fn with_charset<S: Into<String>>(mut self, charset: S) -> Self {
        self.charset = Some(charset.into());
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: DecoderMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ExceptionPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_decoder_options(mut self, options: DecoderOptions) -> Self {
        self.decoder = options;
        self
    }

    #[must_use]
    pub fn with_reader_options(mut self, options: ReaderOptions) -> Self {
        self.reader = options;
        self
    }

    #[must_use]
    pub fn with_release_data_source(mut self, release: bool) -> Self {
        self.release_data_source = release;
        self
    }

    #[must_use]
    pub fn with_reset_counter_on_source_change(mut self, reset: bool) -> Self {
        self.reset_counter_on_source_change = reset;
        self
    }
}

/// Operations common to the parser façades.
pub trait DataParser {
    /// Bind a new source, returning the replaced one unless the parser releases sources.
    ///
    /// # Errors
    /// [`ParseError::Closed`] after [`close`](Self::close).
    fn set_data_source(&mut self, source: Box<dyn Read>) -> Result<Option<Box<dyn Read>>>;

    /// The next record, `Ok(None)` at end of data.
    ///
    /// # Errors
    /// Fatal parse errors; they abort the current source.
    fn get_next(&mut self) -> Result<Option<Record>>;

    /// Skip up to `count` records; returns how many were skipped.
    ///
    /// # Errors
    /// As [`get_next`](Self::get_next).
    fn skip(&mut self, count: usize) -> Result<usize>;

    /// Byte offset of the next record in the current source.
    fn position(&self) -> u64;

    /// Records emitted so far in the logical stream.
    fn record_index(&self) -> u64;

    /// Lenient-policy reports.
    fn errors(&self) -> &ErrorCollector;

    fn state(&self) -> ParserState;

    /// Close the parser, returning the source unless the parser releases sources.
    fn close(&mut self) -> Option<Box<dyn Read>>;

    /// Iterate over the remaining records of the current source.
    fn records(&mut self) -> Records<'_, Self>
    where
        Self: Sized,
    {
        Records {
            parser: self,
            done: false,
        }
    }
}

/// Iterator over the records of a parser; ends after end of data or the first error.
#[derive(Debug)]
pub struct Records<'a, P> {
    parser: &'a mut P,
    done: bool,
}

impl<P: DataParser> Iterator for Records<'_, P> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parser.get_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

macro_rules! impl_data_parser {
    ($parser:ty) => {
        impl DataParser for $parser {
            fn set_data_source(
                &mut self,
                source: Box<dyn Read>,
            ) -> Result<Option<Box<dyn Read>>> {
                <$parser>::set_data_source(self, source)
            }

            fn get_next(&mut self) -> Result<Option<Record>> {
                <$parser>::get_next(self)
            }

            fn skip(&mut self, count: usize) -> Result<usize> {
                <$parser>::skip(self, count)
            }

            fn position(&self) -> u64 {
                <$parser>::position(self)
            }

            fn record_index(&self) -> u64 {
                <$parser>::record_index(self)
            }

            fn errors(&self) -> &ErrorCollector {
                <$parser>::errors(self)
            }

            fn state(&self) -> ParserState {
                <$parser>::state(self)
            }

            fn close(&mut self) -> Option<Box<dyn Read>> {
                <$parser>::close(self)
            }
        }
    };
}

impl_data_parser!(FixLenParser);
impl_data_parser!(MultiLevelParser);

/// Reader, decoder and source-binding state of a façade.
#[derive(Debug)]
pub(crate) struct ParserCore {
    pub(crate) reader: InputReader,
    pub(crate) decoder: FixLenDecoder,
    pub(crate) errors: ErrorCollector,
    state: ParserState,
    release_data_source: bool,
    reset_counter_on_source_change: bool,
}

impl ParserCore {
    pub(crate) fn new(settings: &ParserSettings) -> std::result::Result<Self, ConfigError> {
        let encoding = charset::lookup_or_default(settings.charset.as_deref())?;
        Ok(Self {
            reader: InputReader::with_options(encoding, settings.reader),
            decoder: FixLenDecoder::new(settings.mode, settings.decoder, settings.policy),
            errors: ErrorCollector::new(),
            state: ParserState::Unopened,
            release_data_source: settings.release_data_source,
            reset_counter_on_source_change: settings.reset_counter_on_source_change,
        })
    }

    pub(crate) fn state(&self) -> ParserState {
        self.state
    }

    pub(crate) fn policy(&self) -> ExceptionPolicy {
        self.decoder.policy()
    }

    pub(crate) fn set_data_source(
        &mut self,
        source: Box<dyn Read>,
    ) -> Result<Option<Box<dyn Read>>> {
        if self.state == ParserState::Closed {
            return Err(ParseError::Closed);
        }
        let previous = self.reader.set_input_source(source);
        if self.reset_counter_on_source_change {
            self.decoder.set_record_index(0);
        }
        self.state = ParserState::Open;
        Ok(self.hand_back(previous))
    }

    pub(crate) fn close(&mut self) -> Option<Box<dyn Read>> {
        if self.state == ParserState::Closed {
            return None;
        }
        self.state = ParserState::Closed;
        let previous = self.reader.take_source();
        debug!("parser closed after {} records", self.decoder.record_index());
        self.hand_back(previous)
    }

    fn hand_back(&self, previous: Option<Box<dyn Read>>) -> Option<Box<dyn Read>> {
        let previous = previous?;
        if self.release_data_source {
            debug!("releasing previous data source");
            drop(previous);
            None
        } else {
            Some(previous)
        }
    }

    pub(crate) fn check_open(&self) -> Result<()> {
        match self.state {
            ParserState::Open => Ok(()),
            ParserState::Unopened => Err(ParseError::NotOpen),
            ParserState::Closed => Err(ParseError::Closed),
            ParserState::Aborted => Err(ParseError::Aborted),
        }
    }

    /// Abort the current source and pass `error` on.
    pub(crate) fn fail(&mut self, error: ParseError) -> ParseError {
        debug!("parse aborted at byte {}: {error}", self.reader.position());
        self.reader.release_mark();
        self.state = ParserState::Aborted;
        error
    }

    /// Report the invalid fields of a leniently decoded record.
    pub(crate) fn collect(&mut self, record: &Record) {
        for error in record.errors() {
            self.errors.add_field_error(error.clone());
        }
    }

    pub(crate) fn set_position(&mut self, position: u64) -> Result<()> {
        self.check_open()?;
        self.reader.set_position(position)?;
        Ok(())
    }
}
