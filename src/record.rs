//! Decoded records.

use crate::error::MalformedField;
use std::fmt;

/// The content of one decoded field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Decoded characters of a text field.
    Text(String),
    /// Raw bytes of a binary field.
    Binary(Vec<u8>),
    /// No value: an empty nullable field, or a field past the end of an incomplete record.
    Null,
    /// The field failed its length or decoding requirements (lenient policy only).
    Invalid(MalformedField),
}

impl FieldValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Binary(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::Null => f.write_str("null"),
            Self::Invalid(e) => write!(f, "<invalid: {}>", e.message),
        }
    }
}

/// A decoded fixed-length record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Index of the record type in the metadata pool.
    pub type_index: usize,
    /// Field values in descriptor order.
    pub fields: Vec<FieldValue>,
}

impl Record {
    /// A record of `field_count` null fields.
    #[must_use]
    pub fn new(type_index: usize, field_count: usize) -> Self {
        Self {
            type_index,
            fields: vec![FieldValue::Null; field_count],
        }
    }

    #[must_use]
    pub fn field(&self, idx: usize) -> Option<&FieldValue> {
        self.fields.get(idx)
    }

    /// Text content of field `idx`, if it is a valid text field.
    #[must_use]
    pub fn text(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).and_then(FieldValue::as_text)
    }

    /// `true` if no field is in its error state.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.fields.iter().any(FieldValue::is_invalid)
    }

    /// The errors of all invalid fields.
    pub fn errors(&self) -> impl Iterator<Item = &MalformedField> {
        self.fields.iter().filter_map(|f| match f {
            FieldValue::Invalid(e) => Some(e),
            _ => None,
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}[", self.type_index)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{field}")?;
        }
        f.write_str("]")
    }
}
