//! Record metadata: field descriptors, record types and the metadata pool.
//!
//! The physical layout of a fixed-length record is the concatenation of its fields in
//! descriptor order. A field occupies exactly `length` bytes in byte mode, or `length`
//! characters (after decoding) in character mode. Binary fields are always measured in bytes.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// How the content of a field is handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Decoded with the configured charset.
    #[default]
    Text,
    /// Raw bytes, never decoded.
    Binary,
}

/// One column of a fixed-length record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Declared width in bytes (byte mode, binary fields) or characters (char mode).
    pub length: usize,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub kind: FieldKind,
}

fn default_nullable() -> bool {
    true
}

impl FieldDescriptor {
    /// A nullable text field.
    pub fn text<S: Into<String>>(name: S, length: usize) -> Self {
        Self {
            name: name.into(),
            length,
            nullable: true,
            kind: FieldKind::Text,
        }
    }

    /// A binary field.
    pub fn binary<S: Into<String>>(name: S, length: usize) -> Self {
        Self {
            name: name.into(),
            length,
            nullable: true,
            kind: FieldKind::Binary,
        }
    }

    /// Mark the field as not nullable.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.kind == FieldKind::Binary
    }
}

/// An ordered list of field descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordType {
    pub fn new<S: Into<String>>(name: S, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Sum of the declared field lengths.
    #[must_use]
    pub fn record_length(&self) -> usize {
        self.fields.iter().map(|f| f.length).sum()
    }

    /// Check that the type can be parsed as a fixed-length record.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidMetadata`] if the type has no fields or a
    /// zero-length field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fields.is_empty() {
            return Err(ConfigError::InvalidMetadata(format!(
                "record type '{}' has no fields",
                self.name
            )));
        }
        if let Some(field) = self.fields.iter().find(|f| f.length == 0) {
            return Err(ConfigError::InvalidMetadata(format!(
                "field '{}' of record type '{}' has zero length",
                field.name, self.name
            )));
        }
        Ok(())
    }
}

/// Validate a whole metadata pool.
///
/// # Errors
/// Returns [`ConfigError::InvalidMetadata`] if the pool is empty or any type is invalid.
pub fn validate_pool(pool: &[RecordType]) -> Result<(), ConfigError> {
    if pool.is_empty() {
        return Err(ConfigError::InvalidMetadata("metadata pool is empty".into()));
    }
    pool.iter().try_for_each(RecordType::validate)
}
