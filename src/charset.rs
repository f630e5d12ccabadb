//! Charset lookup.
//!
//! Decoding tables are the process-wide immutable statics of `encoding_rs`; this module only
//! resolves configured names to them. Every reader creates its own stateful decoder from the
//! shared table, so no decoder instance is ever shared between parsers.

use crate::error::ConfigError;
use encoding_rs::Encoding;

/// Charset used when none is configured.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Resolve a charset name (any WHATWG label, case-insensitive) to its encoding.
///
/// # Errors
/// Returns [`ConfigError::UnsupportedCharset`] if the label is unknown.
pub fn lookup(name: &str) -> Result<&'static Encoding, ConfigError> {
    Encoding::for_label(name.trim().as_bytes())
        .ok_or_else(|| ConfigError::UnsupportedCharset(name.to_string()))
}

/// Resolve an optional charset name, falling back to [`DEFAULT_CHARSET`].
///
/// # Errors
/// Returns [`ConfigError::UnsupportedCharset`] if the label is unknown.
pub fn lookup_or_default(name: Option<&str>) -> Result<&'static Encoding, ConfigError> {
    lookup(name.unwrap_or(DEFAULT_CHARSET))
}

/// Decode a complete byte span, returning `None` if any sequence is malformed.
#[must_use]
pub fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// Decode a byte span for diagnostics, replacing malformed sequences.
#[must_use]
pub fn decode_lossy(encoding: &'static Encoding, bytes: &[u8]) -> String {
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}
