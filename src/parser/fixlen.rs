use super::{ParserCore, ParserSettings, ParserState};
use crate::decoder::{FixLenDecoder, RecordDecoder};
use crate::error::{ConfigError, Result};
use crate::metadata::RecordType;
use crate::policy::ErrorCollector;
use crate::reader::InputReader;
use crate::record::Record;
use std::io::Read;

/// Parser for sources holding records of one type.
///
/// ```
/// use flatbeam::metadata::{FieldDescriptor, RecordType};
/// use flatbeam::parser::{FixLenParser, ParserSettings};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let record_type = RecordType::new("person", vec![
///     FieldDescriptor::text("name", 5),
///     FieldDescriptor::text("city", 6),
/// ]);
/// let mut parser = FixLenParser::new(record_type, ParserSettings::default())?;
/// parser.set_data_source(Box::new(std::io::Cursor::new(b"Alice Paris".to_vec())))?;
///
/// let record = parser.get_next()?.expect("one record");
/// assert_eq!(record.text(0), Some("Alice"));
/// assert!(parser.get_next()?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FixLenParser {
    core: ParserCore,
    record_type: RecordType,
}

impl FixLenParser {
    /// # Errors
    /// [`ConfigError`] if the record type is invalid or the charset unknown.
    pub fn new(
        record_type: RecordType,
        settings: ParserSettings,
    ) -> std::result::Result<Self, ConfigError> {
        record_type.validate()?;
        Ok(Self {
            core: ParserCore::new(&settings)?,
            record_type,
        })
    }

    /// Bind a new source. A replaced source is returned unless the parser releases sources.
    ///
    /// # Errors
    /// [`ParseError::Closed`](crate::error::ParseError::Closed) after [`close`](Self::close).
    pub fn set_data_source(&mut self, source: Box<dyn Read>) -> Result<Option<Box<dyn Read>>> {
        self.core.set_data_source(source)
    }

    /// Decode the next record, `Ok(None)` at end of data.
    ///
    /// # Errors
    /// Strict-policy malformed records and reader failures; both abort the source.
    pub fn get_next(&mut self) -> Result<Option<Record>> {
        self.core.check_open()?;
        let core = &mut self.core;
        match core.decoder.parse_next(&mut core.reader, 0, &self.record_type) {
            Ok(Some(record)) => {
                core.collect(&record);
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(core.fail(e)),
        }
    }

    /// Skip up to `count` records; returns how many were skipped.
    ///
    /// # Errors
    /// Reader failures, which abort the source.
    pub fn skip(&mut self, count: usize) -> Result<usize> {
        self.core.check_open()?;
        let core = &mut self.core;
        core.decoder
            .skip(&mut core.reader, &self.record_type, count)
            .map_err(|e| core.fail(e))
    }

    #[must_use]
    pub fn record_type(&self) -> &RecordType {
        &self.record_type
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
