use super::{RecordDecoder, malformed, reject, text_value, truncated};
use crate::charset;
use crate::error::Result;
use crate::metadata::RecordType;
use crate::policy::ExceptionPolicy;
use crate::reader::InputReader;
use crate::record::{FieldValue, Record};
use log::trace;

/// Fixed-length decoder counting every field length in bytes.
///
/// The whole record span is pulled into the reader's window first and then cut into fields,
/// so text fields are decoded as complete byte spans.
#[derive(Debug, Clone, Default)]
pub struct ByteDecoder {
    policy: ExceptionPolicy,
    record_idx: u64,
}

impl ByteDecoder {
    #[must_use]
    pub fn new(policy: ExceptionPolicy) -> Self {
        Self {
            policy,
            record_idx: 0,
        }
    }
}

impl RecordDecoder for ByteDecoder {
    fn parse_next(
        &mut self,
        reader: &mut InputReader,
        type_index: usize,
        record_type: &RecordType,
    ) -> Result<Option<Record>> {
        let length = record_type.record_length();
        let available = reader.ensure_available(length)?;
        if available == 0 {
            return Ok(None);
        }
        let bytes = reader.take_bytes(available);
        let encoding = reader.charset();
        let idx = self.record_idx;

        let mut record = Record::new(type_index, record_type.field_count());
        let mut at = 0;
        for (i, field) in record_type.fields.iter().enumerate() {
            let end = at + field.length;
            if end > bytes.len() {
                let raw = charset::decode_lossy(encoding, &bytes[at..]);
                let error = truncated(idx, field, raw, bytes.len() - at, "bytes");
                reject(self.policy, &mut record, i, error)?;
                break;
            }
            let span = &bytes[at..end];
            at = end;

            if field.is_binary() {
                record.fields[i] = FieldValue::Binary(span.to_vec());
                continue;
            }
            let Some(text) = charset::decode_strict(encoding, span) else {
                let raw = charset::decode_lossy(encoding, span);
                let message = format!("invalid {} byte sequence", encoding.name());
                reject(self.policy, &mut record, i, malformed(idx, field, raw, message))?;
                continue;
            };
            match text_value(idx, field, text) {
                Ok(value) => record.fields[i] = value,
                Err(error) => reject(self.policy, &mut record, i, error)?,
            }
        }

        self.record_idx += 1;
        Ok(Some(record))
    }

    fn skip(
        &mut self,
        reader: &mut InputReader,
        record_type: &RecordType,
        count: usize,
    ) -> Result<usize> {
        let length = record_type.record_length();
        let mut skipped = 0;
        while skipped < count {
            let available = reader.ensure_available(length)?;
            if available < length {
                reader.take_bytes(available);
                break;
            }
            reader.take_bytes(length);
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
