//! Fixed-length record writer.
//!
//! [`FixLenFormatter`] is the inverse of the decoders: every field is written at exactly its
//! declared width, fields and records are concatenated without delimiters. Short values are
//! padded with a filler character, long values are truncated.
//!
//! ```
//! use flatbeam::decoder::DecoderMode;
//! use flatbeam::formatter::{FixLenFormatter, FormatterOptions};
//! use flatbeam::metadata::{FieldDescriptor, RecordType};
//! use flatbeam::record::{FieldValue, Record};
//! # fn main() -> std::io::Result<()> {
//! let record_type = RecordType::new("person", vec![
//!     FieldDescriptor::text("name", 6),
//!     FieldDescriptor::text("age", 3),
//! ]);
//! let record = Record {
//!     type_index: 0,
//!     fields: vec![FieldValue::Text("Ann".into()), FieldValue::Text("42".into())],
//! };
//!
//! let mut formatter = FixLenFormatter::new(
//!     Vec::new(),
//!     encoding_rs::UTF_8,
//!     DecoderMode::Char,
//!     FormatterOptions::default(),
//! );
//! formatter.write(&record_type, &record)?;
//! assert_eq!(formatter.finish()?, b"Ann   42 ");
//! # Ok(())
//! # }
//! ```

use crate::decoder::DecoderMode;
use crate::io::create_sink;
use crate::metadata::{FieldDescriptor, RecordType};
use crate::record::{FieldValue, Record};
use encoding_rs::{EncoderResult, Encoding};
use log::trace;
use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind, Write};
use std::path::Path;

/// Placement of a short value inside its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Right,
}

/// Padding settings of a [`FixLenFormatter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterOptions {
    /// Pads text fields; must encode to a single byte in byte mode.
    pub filler: char,
    pub alignment: Alignment,
    /// Pads binary fields.
    pub binary_filler: u8,
}

impl Default for FormatterOptions {
    fn default() -> Self {
        Self {
            filler: ' ',
            alignment: Alignment::Left,
            binary_filler: 0,
        }
    }
}

/// Writes records as concatenated fixed-width fields.
#[derive(Debug)]
pub struct FixLenFormatter<W: Write> {
    writer: W,
    encoding: &'static Encoding,
    mode: DecoderMode,
    options: FormatterOptions,
    written: u64,
}

impl FixLenFormatter<Box<dyn Write>> {
    /// Create a formatter writing to `path`, compressed according to its file name.
    ///
    /// # Errors
    /// If the file cannot be created.
    pub fn create(
        path: impl AsRef<Path>,
        encoding: &'static Encoding,
        mode: DecoderMode,
        options: FormatterOptions,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(create_sink(path)?, encoding, mode, options))
    }
}

impl<W: Write> FixLenFormatter<W> {
    #[must_use]
    pub fn new(
        writer: W,
        encoding: &'static Encoding,
        mode: DecoderMode,
        options: FormatterOptions,
    ) -> Self {
        Self {
            writer,
            encoding,
            mode,
            options,
            written: 0,
        }
    }

    /// Records written so far.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.written
    }

    /// Write one record laid out as `record_type`. Missing fields are written as filler.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidData`] if a value cannot be represented in the charset, and any
    /// error of the underlying writer.
    pub fn write(&mut self, record_type: &RecordType, record: &Record) -> io::Result<()> {
        let mut out = Vec::with_capacity(record_type.record_length());
        for (i, field) in record_type.fields.iter().enumerate() {
            let value = record.fields.get(i).unwrap_or(&FieldValue::Null);
            match value {
                FieldValue::Binary(bytes) => out.extend(self.binary_field(field, bytes)),
                FieldValue::Text(text) => out.extend(self.text_field(field, text)?),
                FieldValue::Invalid(error) => out.extend(self.text_field(field, &error.raw)?),
                FieldValue::Null if field.is_binary() => out.extend(self.binary_field(field, &[])),
                FieldValue::Null => out.extend(self.text_field(field, "")?),
            }
        }
        self.writer.write_all(&out)?;
        self.written += 1;
        trace!("wrote record #{} ({} bytes)", self.written, out.len());
        Ok(())
    }

    /// Write all `records` with their types taken from `pool`.
    ///
    /// # Errors
    /// As [`write`](Self::write), and [`ErrorKind::InvalidInput`] for a type index outside
    /// of `pool`.
    pub fn write_all<'a, I>(&mut self, pool: &[RecordType], records: I) -> io::Result<()>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        for record in records {
            let record_type = pool.get(record.type_index).ok_or_else(|| {
                io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("record type {} is not in the pool", record.type_index),
                )
            })?;
            self.write(record_type, record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    /// If flushing fails.
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn binary_field(&self, field: &FieldDescriptor, bytes: &[u8]) -> Vec<u8> {
        let value = &bytes[..bytes.len().min(field.length)];
        let pad = vec![self.options.binary_filler; field.length - value.len()];
        match self.options.alignment {
            Alignment::Left => [value, pad.as_slice()].concat(),
            Alignment::Right => [pad.as_slice(), value].concat(),
        }
    }

    fn text_field(&self, field: &FieldDescriptor, text: &str) -> io::Result<Vec<u8>> {
        match self.mode {
            DecoderMode::Char => {
                let value: String = text.chars().take(field.length).collect();
                let pad = field.length - value.chars().count();
                let padded = self.pad(&value, pad);
                self.encode(&padded)
            }
            DecoderMode::Byte => {
                let mut value = self.encode(text)?;
                if value.len() > field.length {
                    // cut at a character boundary
                    let mut keep = String::new();
                    for c in text.chars() {
                        keep.push(c);
                        if self.encode(&keep)?.len() > field.length {
                            keep.pop();
                            break;
                        }
                    }
                    value = self.encode(&keep)?;
                }
                let filler = self.encode(self.options.filler.encode_utf8(&mut [0; 4]))?;
                if filler.len() != 1 {
                    return Err(io::Error::new(
                        ErrorKind::InvalidInput,
                        "filler must encode to a single byte in byte mode",
                    ));
                }
                let pad = vec![filler[0]; field.length - value.len()];
                Ok(match self.options.alignment {
                    Alignment::Left => [value, pad].concat(),
                    Alignment::Right => [pad, value].concat(),
                })
            }
        }
    }

    fn pad(&self, value: &str, count: usize) -> String {
        let pad: String = std::iter::repeat_n(self.options.filler, count).collect();
        match self.options.alignment {
            Alignment::Left => format!("{value}{pad}"),
            Alignment::Right => format!("{pad}{value}"),
        }
    }

    fn encode(&self, text: &str) -> io::Result<Vec<u8>> {
        let mut encoder = self.encoding.new_encoder();
        let mut out = Vec::with_capacity(
            encoder
                .max_buffer_length_from_utf8_without_replacement(text.len())
                .unwrap_or(text.len() * 4),
        );
        let (result, _) = encoder.encode_from_utf8_to_vec_without_replacement(text, &mut out, true);
        match result {
            EncoderResult::InputEmpty => Ok(out),
            EncoderResult::Unmappable(c) => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("'{c}' cannot be encoded as {}", self.encoding.name()),
            )),
            EncoderResult::OutputFull => Err(io::Error::other("encoder output buffer exhausted")),
        }
    }
}
