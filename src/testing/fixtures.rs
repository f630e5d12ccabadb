//! Record pools and input builders for common test scenarios.

use crate::metadata::{FieldDescriptor, RecordType};
use crate::selector::SelectorConfig;

/// Two text fields of 3 and 4 characters; record length 7.
#[must_use]
pub fn type_a() -> RecordType {
    RecordType::new(
        "TypeA",
        vec![FieldDescriptor::text("a1", 3), FieldDescriptor::text("a2", 4)],
    )
}

/// One text field of 5 characters.
#[must_use]
pub fn type_b() -> RecordType {
    RecordType::new("TypeB", vec![FieldDescriptor::text("b1", 5)])
}

/// `[TypeA, TypeB]`.
#[must_use]
pub fn two_type_pool() -> Vec<RecordType> {
    vec![type_a(), type_b()]
}

/// Prefix mapping `XX → 0`, `YYYYY → 1` for [`two_type_pool`].
#[must_use]
pub fn two_type_prefixes() -> SelectorConfig {
    SelectorConfig::new().with("XX", "0").with("YYYYY", "1")
}

/// A header / detail / trailer layout keyed by a three-letter tag.
///
/// Each type starts with a `tag` field; the tag itself is part of the record.
#[must_use]
pub fn ledger_pool() -> Vec<RecordType> {
    vec![
        RecordType::new(
            "header",
            vec![
                FieldDescriptor::text("tag", 3).required(),
                FieldDescriptor::text("date", 8),
            ],
        ),
        RecordType::new(
            "detail",
            vec![
                FieldDescriptor::text("tag", 3).required(),
                FieldDescriptor::text("account", 6),
                FieldDescriptor::text("amount", 8),
            ],
        ),
        RecordType::new(
            "trailer",
            vec![
                FieldDescriptor::text("tag", 3).required(),
                FieldDescriptor::text("count", 4),
            ],
        ),
    ]
}

/// Tags `HDR → 0`, `DTL → 1`, `TRL → 2` for [`ledger_pool`].
#[must_use]
pub fn ledger_prefixes() -> SelectorConfig {
    SelectorConfig::new()
        .with("HDR", "0")
        .with("DTL", "1")
        .with("TRL", "2")
}

/// Build fixed-width input text from field values.
///
/// ```
/// use flatbeam::testing::FixedWidthBuilder;
///
/// let text = FixedWidthBuilder::new()
///     .field("HDR", 3)
///     .field("2024", 8)
///     .build();
/// assert_eq!(text, "HDR2024    ");
/// ```
#[derive(Debug, Clone, Default)]
pub struct FixedWidthBuilder {
    text: String,
}

impl FixedWidthBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` left-aligned in `width` characters, truncated if longer.
    #[must_use]
    pub fn field(mut self, value: &str, width: usize) -> Self {
        let value: String = value.chars().take(width).collect();
        let pad = width - value.chars().count();
        self.text.push_str(&value);
        self.text.extend(std::iter::repeat_n(' ', pad));
        self
    }

    /// Append text verbatim, e.g. deliberately broken data.
    #[must_use]
    pub fn raw(mut self, text: &str) -> Self {
        self.text.push_str(text);
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.text
    }

    #[must_use]
    pub fn build_bytes(self) -> Vec<u8> {
        self.text.into_bytes()
    }
}
