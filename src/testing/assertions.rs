//! Assertions over decoded records.

use crate::error::Result;
use crate::parser::DataParser;
use crate::record::{FieldValue, Record};

/// Drain `parser` until end of data.
///
/// # Errors
/// The first error returned by the parser.
pub fn collect_records<P: DataParser>(parser: &mut P) -> Result<Vec<Record>> {
    parser.records().collect()
}

/// Assert the text content of every field of every record.
///
/// `None`-like fields (null, binary, invalid) never match an expected string.
///
/// # Panics
/// If the record count or any field differs.
pub fn assert_texts(records: &[Record], expected: &[&[&str]]) {
    assert_eq!(
        records.len(),
        expected.len(),
        "Record count mismatch:\n  Expected: {expected:?}\n  Actual: {records:?}"
    );
    for (i, (record, fields)) in records.iter().zip(expected).enumerate() {
        let actual: Vec<Option<&str>> = record.fields.iter().map(FieldValue::as_text).collect();
        let wanted: Vec<Option<&str>> = fields.iter().map(|f| Some(*f)).collect();
        assert_eq!(
            actual, wanted,
            "Field mismatch in record {i}:\n  Expected: {fields:?}\n  Actual: {record}"
        );
    }
}

/// Assert the type index of every record.
///
/// # Panics
/// If the sequences differ.
pub fn assert_types(records: &[Record], expected: &[usize]) {
    let actual: Vec<usize> = records.iter().map(|r| r.type_index).collect();
    assert_eq!(actual, expected, "Record type mismatch");
}

/// Assert that no field of any record is invalid.
///
/// # Panics
/// On the first record holding an invalid field.
pub fn assert_all_valid(records: &[Record]) {
    if let Some((i, record)) = records.iter().enumerate().find(|(_, r)| !r.is_valid()) {
        let errors: Vec<String> = record.errors().map(ToString::to_string).collect();
        panic!("Record {i} has invalid fields: {errors:?}");
    }
}
