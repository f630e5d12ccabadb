//! # Flatbeam
//!
//! A **record-boundary and type-discovery layer** for fixed-length flat files. Flatbeam reads a
//! byte stream, works out where each record starts and which type it has, and decodes its
//! fields according to record metadata.
//!
//! ## Key Features
//!
//! - **Dual-mode input** - lengths measured in bytes or in decoded characters of any
//!   [`encoding_rs`] charset
//! - **Mark and revert** - look ahead into the stream without consuming it
//! - **Multi-level files** - classify each record by a prefix, a code at a fixed position, or
//!   any custom rule
//! - **Strict or lenient** - fail on the first malformed record, or collect problems and keep
//!   going
//! - **Compressed sources** - gzip, zstd, bzip2 and xz (optional via feature flags)
//!
//! ## Quick Start
//!
//! ```
//! use flatbeam::*;
//! use std::io::Cursor;
//!
//! # fn main() -> flatbeam::Result<()> {
//! let pool = vec![
//!     RecordType::new("header", vec![
//!         FieldDescriptor::text("tag", 3),
//!         FieldDescriptor::text("date", 8),
//!     ]),
//!     RecordType::new("detail", vec![
//!         FieldDescriptor::text("tag", 3),
//!         FieldDescriptor::text("amount", 5),
//!     ]),
//! ];
//! let mapping = SelectorConfig::new().with("HDR", "0").with("DTL", "1");
//! let mut parser = MultiLevelParser::new(
//!     pool,
//!     Box::new(PrefixSelector::new()),
//!     &mapping,
//!     ParserSettings::default(),
//! )?;
//!
//! parser.set_data_source(Box::new(Cursor::new("HDR20240101DTL00042DTL00007")))?;
//! let mut amounts = Vec::new();
//! while let Some(record) = parser.get_next()? {
//!     if record.type_index == 1 {
//!         amounts.push(record.text(1).unwrap_or_default().to_string());
//!     }
//! }
//! assert_eq!(amounts, ["00042", "00007"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Input reader
//!
//! The [`InputReader`] buffers a source and serves it either as bytes or as characters. A mark
//! pins the buffer so the caller can read ahead and [`revert`](InputReader::revert) to it.
//!
//! ### Metadata
//!
//! A [`RecordType`] is an ordered list of [`FieldDescriptor`]s. The record length is the sum
//! of the field lengths, counted in bytes or characters depending on the [`DecoderMode`].
//!
//! ### Type selectors
//!
//! A [`TypeSelector`] inspects the start of a record and picks its type from the metadata
//! pool. Built in: [`PrefixSelector`], [`PositionSelector`] and [`CustomSelector`].
//!
//! ### Parsers
//!
//! [`FixLenParser`] reads records of one type; [`MultiLevelParser`] asks a selector for the
//! type of every record. Both implement [`DataParser`] and apply an [`ExceptionPolicy`]:
//! - **Strict** - the first malformed record is a [`ParseError`]
//! - **Lenient** - malformed fields become [`FieldValue::Invalid`], and problems are collected
//!   in an [`ErrorCollector`]
//!
//! ## Feature Flags
//!
//! - `compression-gzip` - gzip sources (`.gz`)
//! - `compression-zstd` - zstd sources (`.zst`)
//! - `compression-bzip2` - bzip2 sources (`.bz2`)
//! - `compression-xz` - xz sources (`.xz`)
//!
//! All four are enabled by default.
//!
//! ## Module Overview
//!
//! - [`reader`] - buffered dual-mode input with mark and revert
//! - [`charset`] - charset lookup and decoding helpers
//! - [`metadata`] - record types and field descriptors
//! - [`record`] - decoded records and field values
//! - [`selector`] - record type selection
//! - [`decoder`] - fixed-length record decoders
//! - [`parser`] - parser façades and their life cycle
//! - [`policy`] - exception policy and error collection
//! - [`formatter`] - writing records back to fixed-length form
//! - [`config`] - JSON parser configuration
//! - [`io`] - file sources, compression and globbing
//! - [`testing`] - helpers for tests

pub mod charset;
pub mod config;
pub mod decoder;
pub mod error;
pub mod formatter;
pub mod io;
pub mod metadata;
pub mod parser;
pub mod policy;
pub mod reader;
pub mod record;
pub mod selector;
pub mod testing;

// General re-exports
pub use config::ParserConfig;
pub use decoder::{DecoderMode, DecoderOptions, FixLenDecoder, RecordDecoder};
pub use error::{ConfigError, InputError, MalformedField, ParseError, Result};
pub use formatter::{Alignment, FixLenFormatter, FormatterOptions};
pub use io::FileSet;
pub use metadata::{FieldDescriptor, FieldKind, RecordType};
pub use parser::{DataParser, FixLenParser, MultiLevelParser, ParserSettings, ParserState};
pub use policy::{ErrorCollector, ExceptionPolicy, RecordProblem};
pub use reader::{InputReader, Next, ReaderOptions};
pub use record::{FieldValue, Record};
pub use selector::{
    CustomSelector, Lookahead, NeedMoreData, PositionSelector, PrefixSelector, SelectorConfig,
    TypeSelector,
};
