//! Fixed-length record decoders.
//!
//! A decoder consumes exactly the declared field lengths of one record type from an
//! [`InputReader`] and fills a [`Record`]. Two variants exist:
//! - [`ByteDecoder`] - field lengths are byte counts; text fields are decoded as a whole
//! - [`CharDecoder`] - text field lengths are character counts, binary fields are read as raw
//!   bytes through the same reader
//!
//! [`FixLenDecoder`] picks one of them from a [`DecoderMode`] and forwards every operation.
//!
//! # End of data
//!
//! Zero remaining bytes at a record boundary is a clean end of data (`Ok(None)`). Anything
//! between one byte and a whole record is an incomplete record, reported as a
//! [`MalformedField`] on the field where the input ran out.
//!
//! # Exception policy
//!
//! Under [`ExceptionPolicy::Strict`] the first malformed field is returned as
//! [`ParseError::Malformed`]. Under [`ExceptionPolicy::Lenient`] the field is stored as
//! [`FieldValue::Invalid`] and the record is still returned.

mod byte_decoder;
mod char_decoder;

pub use byte_decoder::ByteDecoder;
pub use char_decoder::CharDecoder;

use crate::error::{MalformedField, ParseError, Result};
use crate::metadata::{FieldDescriptor, RecordType};
use crate::policy::ExceptionPolicy;
use crate::reader::InputReader;
use crate::record::{FieldValue, Record};
use log::debug;
use serde::{Deserialize, Serialize};

/// Unit of the declared field lengths of text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderMode {
    /// Lengths in bytes.
    #[default]
    Byte,
    /// Text lengths in decoded characters.
    Char,
}

/// Character-mode record options. Byte mode ignores all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Accept a truncated final record, filling the missing fields with `Null`.
    pub enable_incomplete: bool,
    /// Drop records whose text is entirely blank. Dropped records are not counted.
    pub skip_empty: bool,
    /// Strip leading whitespace from text fields.
    pub skip_leading_blanks: bool,
    /// Strip trailing whitespace from text fields.
    pub skip_trailing_blanks: bool,
}

/// Operations shared by the fixed-length decoders.
pub trait RecordDecoder {
    /// Decode the next record of `record_type`.
    ///
    /// Returns `Ok(None)` at a clean end of data.
    ///
    /// # Errors
    /// [`ParseError::Malformed`] for a malformed field under the strict policy, and
    /// [`ParseError::Input`] for reader failures.
    fn parse_next(
        &mut self,
        reader: &mut InputReader,
        type_index: usize,
        record_type: &RecordType,
    ) -> Result<Option<Record>>;

    /// Skip up to `count` whole records without decoding them.
    ///
    /// Returns the number of records actually skipped; the record counter advances by
    /// the same amount.
    ///
    /// # Errors
    /// [`ParseError::Input`] for reader failures.
    fn skip(&mut self, reader: &mut InputReader, record_type: &RecordType, count: usize)
    -> Result<usize>;

    /// Number of records emitted so far.
    fn record_index(&self) -> u64;

    fn set_record_index(&mut self, index: u64);

    fn policy(&self) -> ExceptionPolicy;

    fn set_policy(&mut self, policy: ExceptionPolicy);
}

/// A decoder of either mode.
#[derive(Debug, Clone)]
pub enum FixLenDecoder {
    Byte(ByteDecoder),
    Char(CharDecoder),
}

impl FixLenDecoder {
    /// Create the decoder variant for `mode`.
    #[must_use]
    pub fn new(mode: DecoderMode, options: DecoderOptions, policy: ExceptionPolicy) -> Self {
        match mode {
            DecoderMode::Byte => {
                if options != DecoderOptions::default() {
                    debug!("character-mode options ignored by the byte decoder: {options:?}");
                }
                Self::Byte(ByteDecoder::new(policy))
            }
            DecoderMode::Char => Self::Char(CharDecoder::new(options, policy)),
        }
    }

    #[must_use]
    pub fn mode(&self) -> DecoderMode {
        match self {
            Self::Byte(_) => DecoderMode::Byte,
            Self::Char(_) => DecoderMode::Char,
        }
    }

    /// Effective options; all `false` in byte mode.
    #[must_use]
    pub fn options(&self) -> DecoderOptions {
        match self {
            Self::Byte(_) => DecoderOptions::default(),
            Self::Char(d) => d.options(),
        }
    }

    fn char_options(&mut self) -> Option<&mut DecoderOptions> {
        match self {
            Self::Byte(_) => None,
            Self::Char(d) => Some(d.options_mut()),
        }
    }

    #[must_use]
    pub fn is_enable_incomplete(&self) -> bool {
        self.options().enable_incomplete
    }

    pub fn set_enable_incomplete(&mut self, enable: bool) {
        if let Some(o) = self.char_options() {
            o.enable_incomplete = enable;
        }
    }

    #[must_use]
    pub fn is_skip_empty(&self) -> bool {
        self.options().skip_empty
    }

    pub fn set_skip_empty(&mut self, skip: bool) {
        if let Some(o) = self.char_options() {
            o.skip_empty = skip;
        }
    }

    #[must_use]
    pub fn is_skip_leading_blanks(&self) -> bool {
        self.options().skip_leading_blanks
    }

    pub fn set_skip_leading_blanks(&mut self, skip: bool) {
        if let Some(o) = self.char_options() {
            o.skip_leading_blanks = skip;
        }
    }

    #[must_use]
    pub fn is_skip_trailing_blanks(&self) -> bool {
        self.options().skip_trailing_blanks
    }

    pub fn set_skip_trailing_blanks(&mut self, skip: bool) {
        if let Some(o) = self.char_options() {
            o.skip_trailing_blanks = skip;
        }
    }

    fn inner(&mut self) -> &mut dyn RecordDecoder {
        match self {
            Self::Byte(d) => d,
            Self::Char(d) => d,
        }
    }
}

impl RecordDecoder for FixLenDecoder {
    fn parse_next(
        &mut self,
        reader: &mut InputReader,
        type_index: usize,
        record_type: &RecordType,
    ) -> Result<Option<Record>> {
        self.inner().parse_next(reader, type_index, record_type)
    }

    fn skip(
        &mut self,
        reader: &mut InputReader,
        record_type: &RecordType,
        count: usize,
    ) -> Result<usize> {
        self.inner().skip(reader, record_type, count)
    }

    fn record_index(&self) -> u64 {
        match self {
            Self::Byte(d) => d.record_index(),
            Self::Char(d) => d.record_index(),
        }
    }

    fn set_record_index(&mut self, index: u64) {
        self.inner().set_record_index(index);
    }

    fn policy(&self) -> ExceptionPolicy {
        match self {
            Self::Byte(d) => d.policy(),
            Self::Char(d) => d.policy(),
        }
    }

    fn set_policy(&mut self, policy: ExceptionPolicy) {
        self.inner().set_policy(policy);
    }
}

pub(crate) fn malformed(
    record: u64,
    field: &FieldDescriptor,
    raw: impl Into<String>,
    message: impl Into<String>,
) -> MalformedField {
    MalformedField {
        record,
        field: field.name.clone(),
        raw: raw.into(),
        message: message.into(),
    }
}

pub(crate) fn truncated(
    record: u64,
    field: &FieldDescriptor,
    raw: String,
    found: usize,
    unit: &str,
) -> MalformedField {
    malformed(
        record,
        field,
        raw,
        format!(
            "unexpected end of input: expected {} {unit}, found {found}",
            field.length
        ),
    )
}

/// Value of a decoded text field: blank text is `Null` for nullable fields and malformed
/// otherwise.
pub(crate) fn text_value(
    record: u64,
    field: &FieldDescriptor,
    text: String,
) -> std::result::Result<FieldValue, MalformedField> {
    if !text.trim().is_empty() {
        return Ok(FieldValue::Text(text));
    }
    if field.nullable {
        Ok(FieldValue::Null)
    } else {
        Err(malformed(record, field, text, "field is not nullable"))
    }
}

/// Apply `policy` to a malformed field of `record`.
pub(crate) fn reject(
    policy: ExceptionPolicy,
    record: &mut Record,
    idx: usize,
    error: MalformedField,
) -> Result<()> {
    match policy {
        ExceptionPolicy::Strict => Err(ParseError::Malformed(error)),
        ExceptionPolicy::Lenient => {
            record.fields[idx] = FieldValue::Invalid(error);
            Ok(())
        }
    }
}
