use super::{DecoderOptions, RecordDecoder, malformed, reject, text_value, truncated};
use crate::charset;
use crate::error::{InputError, MalformedField, Result};
use crate::metadata::{FieldDescriptor, RecordType};
use crate::policy::ExceptionPolicy;
use crate::reader::{InputReader, Next};
use crate::record::{FieldValue, Record};
use log::trace;

/// Characters read for one text field.
struct TextSpan {
    text: String,
    count: usize,
    /// Some bytes of the span did not decode.
    undecodable: bool,
}

/// Fixed-length decoder counting text field lengths in decoded characters.
///
/// Binary fields are still measured in bytes and read raw from the same cursor.
#[derive(Debug, Clone, Default)]
pub struct CharDecoder {
    options: DecoderOptions,
    policy: ExceptionPolicy,
    record_idx: u64,
}

impl CharDecoder {
    #[must_use]
    pub fn new(options: DecoderOptions, policy: ExceptionPolicy) -> Self {
        Self {
            options,
            policy,
            record_idx: 0,
        }
    }

    #[must_use]
    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    pub fn options_mut(&mut self) -> &mut DecoderOptions {
        &mut self.options
    }

    /// Read up to `length` characters. An undecodable byte counts as one character.
    fn read_text(reader: &mut InputReader, length: usize) -> Result<TextSpan> {
        let mut span = TextSpan {
            text: String::with_capacity(length),
            count: 0,
            undecodable: false,
        };
        while span.count < length {
            match reader.read_char()? {
                Next::Item(c) => span.text.push(c),
                Next::EndOfInput => break,
                Next::DecodingFailed => {
                    if reader.skip_bytes(1)? == 0 {
                        break;
                    }
                    span.text.push(char::REPLACEMENT_CHARACTER);
                    span.undecodable = true;
                }
                Next::BlockedByMark => {
                    return Err(InputError::BlockedByMark {
                        capacity: reader.options().max_capacity,
                    }
                    .into());
                }
            }
            span.count += 1;
        }
        Ok(span)
    }

    fn trim<'a>(&self, text: &'a str) -> &'a str {
        let text = if self.options.skip_leading_blanks {
            text.trim_start()
        } else {
            text
        };
        if self.options.skip_trailing_blanks {
            text.trim_end()
        } else {
            text
        }
    }

    fn text_field(
        &self,
        idx: u64,
        field: &FieldDescriptor,
        text: &str,
    ) -> std::result::Result<FieldValue, MalformedField> {
        text_value(idx, field, self.trim(text).to_string())
    }

    /// Skip one record; `false` if the input ended inside it.
    fn skip_record(reader: &mut InputReader, record_type: &RecordType) -> Result<bool> {
        for field in &record_type.fields {
            let skipped = if field.is_binary() {
                reader.skip_bytes(field.length as isize)? as usize
            } else {
                reader.skip_chars_lossy(field.length)?
            };
            if skipped < field.length {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl RecordDecoder for CharDecoder {
    fn parse_next(
        &mut self,
        reader: &mut InputReader,
        type_index: usize,
        record_type: &RecordType,
    ) -> Result<Option<Record>> {
        loop {
            let idx = self.record_idx;
            let mut record = Record::new(type_index, record_type.field_count());
            let mut blank = true;
            // applied once the record is known not to be dropped as empty
            let mut problems: Vec<(usize, MalformedField)> = Vec::new();

            for (i, field) in record_type.fields.iter().enumerate() {
                if field.is_binary() {
                    let available = reader.ensure_available(field.length)?;
                    let bytes = reader.take_bytes(available);
                    if i == 0 && bytes.is_empty() {
                        return Ok(None);
                    }
                    blank &= bytes.iter().all(|b| *b == b' ');
                    if bytes.len() < field.length {
                        if self.options.enable_incomplete {
                            if !bytes.is_empty() {
                                record.fields[i] = FieldValue::Binary(bytes);
                            }
                        } else {
                            let raw = charset::decode_lossy(reader.charset(), &bytes);
                            let error = truncated(idx, field, raw, bytes.len(), "bytes");
                            problems.push((i, error));
                        }
                        break;
                    }
                    record.fields[i] = FieldValue::Binary(bytes);
                    continue;
                }

                let span = Self::read_text(reader, field.length)?;
                if i == 0 && span.count == 0 {
                    return Ok(None);
                }
                blank &= span.text.trim().is_empty();
                if span.count < field.length {
                    if self.options.enable_incomplete {
                        if span.count > 0 {
                            match self.text_field(idx, field, &span.text) {
                                Ok(value) => record.fields[i] = value,
                                Err(error) => problems.push((i, error)),
                            }
                        }
                    } else {
                        let error = truncated(idx, field, span.text, span.count, "characters");
                        problems.push((i, error));
                    }
                    break;
                }
                if span.undecodable {
                    let message = format!("invalid {} byte sequence", reader.charset().name());
                    problems.push((i, malformed(idx, field, span.text, message)));
                    continue;
                }
                match self.text_field(idx, field, &span.text) {
                    Ok(value) => record.fields[i] = value,
                    Err(error) => problems.push((i, error)),
                }
            }

            if self.options.skip_empty && blank {
                trace!("dropping empty record at byte {}", reader.position());
                continue;
            }
            for (i, error) in problems {
                reject(self.policy, &mut record, i, error)?;
            }
            self.record_idx += 1;
            return Ok(Some(record));
        }
    }

    fn skip(
        &mut self,
        reader: &mut InputReader,
        record_type: &RecordType,
        count: usize,
    ) -> Result<usize> {
        let mut skipped = 0;
        while skipped < count && Self::skip_record(reader, record_type)? {
            skipped += 1;
        }
        self.record_idx += skipped as u64;
        trace!("skipped {skipped} of {count} records of type '{}'", record_type.name);
        Ok(skipped)
    }

    fn record_index(&self) -> u64 {
        self.record_idx
    }

    fn set_record_index(&mut self, index: u64) {
        self.record_idx = index;
    }

    fn policy(&self) -> ExceptionPolicy {
        self.policy
    }

    fn set_policy(&mut self, policy: ExceptionPolicy) {
        self.policy = policy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldDescriptor;
    use std::io::Cursor;

    fn reader_over(text: &str) -> InputReader {
        let mut reader = InputReader::new(encoding_rs::UTF_8);
        reader.set_input_source(Box::new(Cursor::new(text.as_bytes().to_vec())));
        reader
    }

    #[test]
    fn test_undecodable_byte_counts_as_one_character() {
        let mut reader = InputReader::new(encoding_rs::UTF_8);
        reader.set_input_source(Box::new(Cursor::new(vec![b'a', 0xff, b'b', b'c'])));
        let span = CharDecoder::read_text(&mut reader, 3).unwrap();
        assert_eq!(span.count, 3);
        assert!(span.undecodable);
        assert_eq!(span.text, "a\u{fffd}b");
        assert_eq!(reader.read_char().unwrap(), Next::Item('c'));
    }

    #[test]
    fn test_trimming_options() {
        let rt = RecordType::new("t", vec![FieldDescriptor::text("f", 5)]);
        let options = DecoderOptions {
            skip_leading_blanks: true,
            skip_trailing_blanks: true,
            ..DecoderOptions::default()
        };
        let mut decoder = CharDecoder::new(options, ExceptionPolicy::Strict);
        let mut reader = reader_over(" ab  ");
        let record = decoder.parse_next(&mut reader, 0, &rt).unwrap().unwrap();
        assert_eq!(record.text(0), Some("ab"));
    }
}
