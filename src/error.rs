//! Error types shared by the reader, selectors, decoders and parser façades.
//!
//! The taxonomy follows the life cycle of an input session:
//! - [`ConfigError`] - invalid selector mapping or record pool, fatal at initialization
//! - [`InputError`] - reader usage errors, mark-capacity exhaustion and I/O failures
//! - [`ParseError`] - malformed records under the strict policy, plus everything above
//!
//! End of data is never an error: it is reported as `Ok(None)` by the parsers.

use thiserror::Error;

/// Errors raised while validating a selector mapping or a record pool.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The selector mapping has no entries at all.
    #[error("type selector mapping is empty")]
    EmptyMapping,

    /// A mapping key is the empty string.
    #[error("type selector key must not be empty")]
    EmptyKey,

    /// Two mapping keys of the same length are equal.
    #[error("duplicate selector key '{key}' (length {length})")]
    DuplicateKey { key: String, length: usize },

    /// A mapping value does not parse as a type index.
    #[error("value '{value}' of selector key '{key}' is not a record type index")]
    InvalidTypeIndex { key: String, value: String },

    /// A mapping value points outside of the metadata pool.
    #[error("record type index {index} of key '{key}' is out of range (pool has {pool_size} types)")]
    TypeIndexOutOfRange {
        key: String,
        index: usize,
        pool_size: usize,
    },

    /// A required selector setting is absent.
    #[error("missing selector setting '{0}'")]
    MissingSetting(&'static str),

    /// A selector setting has a value that cannot be used.
    #[error("invalid value '{value}' for selector setting '{setting}'")]
    InvalidSetting { setting: &'static str, value: String },

    /// The metadata pool is empty or a record type cannot be parsed at fixed length.
    #[error("invalid record metadata: {0}")]
    InvalidMetadata(String),

    /// The configured charset name is unknown.
    #[error("unsupported charset '{0}'")]
    UnsupportedCharset(String),
}

/// Errors raised by [`InputReader`](crate::reader::InputReader).
#[derive(Debug, Error)]
pub enum InputError {
    /// Reading from the underlying byte source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No byte source is bound to the reader.
    #[error("no input source bound to the reader")]
    NoSource,

    /// `revert` or a sequence extraction was called without an active mark.
    #[error("no mark is set")]
    NoMark,

    /// `mark` was called while another mark is still outstanding.
    #[error("a mark is already set at byte offset {0}")]
    MarkAlreadySet(u64),

    /// `set_position` was called after reading started on the current source.
    #[error("position can only be set before reading starts (already at byte {0})")]
    PositionLocked(u64),

    /// The span protected by the mark outgrew the maximum buffer capacity.
    #[error("buffer capacity of {capacity} bytes exhausted by the span of the active mark")]
    BlockedByMark { capacity: usize },

    /// The marked span could not be decoded with the configured charset.
    #[error("marked span is not valid {charset}")]
    Malformed { charset: &'static str },
}

/// A malformed field, with the raw content that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("{message} when parsing record #{record} field '{field}' value \"{raw}\"")]
pub struct MalformedField {
    /// Index of the record in the logical stream.
    pub record: u64,
    /// Name of the field descriptor.
    pub field: String,
    /// Offending raw content, decoded lossily for diagnostics.
    pub raw: String,
    /// What went wrong.
    pub message: String,
}

/// Errors surfaced by the decoders and parser façades.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] InputError),

    /// A field failed its length or decoding requirements (strict policy).
    #[error("malformed record: {0}")]
    Malformed(#[from] MalformedField),

    /// No record type could be determined for the data at `position`.
    #[error("unable to determine record type at byte {position}")]
    UnknownRecordType { position: u64 },

    /// The selector could not find the start of another record after bad data.
    #[error("unable to recover from bad input at byte {position}")]
    Unrecoverable { position: u64 },

    /// The parser is not bound to a data source.
    #[error("parser is not open")]
    NotOpen,

    /// The parser was closed.
    #[error("parser is closed")]
    Closed,

    /// An earlier fatal error aborted the parse of the current source.
    #[error("parse of the current source was aborted by an earlier error")]
    Aborted,
}

/// A convenience `Result` type alias using the crate's [`ParseError`] type.
pub type Result<T> = std::result::Result<T, ParseError>;
