//! Record type selection by bounded lookahead.
//!
//! A [`TypeSelector`] inspects the characters at the start of the next unclassified span and
//! decides which record type of the metadata pool applies, and how many characters to skip
//! before the record body begins. Selectors never consume input: the caller hands them a
//! [`Lookahead`] view and, when they answer [`NeedMoreData`], a larger view of the same span.
//!
//! Strategies:
//! - [`PrefixSelector`] - keyed by the leading characters of the record
//! - [`PositionSelector`] - keyed by a code at a fixed character position
//! - [`CustomSelector`] - user closures
//!
//! # Configuration
//!
//! Selectors are configured from a property list ([`SelectorConfig`]): every entry maps a key
//! to a record type index. Keys starting with [`SETTING_PREFIX`] are strategy settings rather
//! than mapping entries.
//!
//! ```
//! use flatbeam::selector::SelectorConfig;
//!
//! let config = SelectorConfig::parse_properties("
//!     ## record types by prefix
//!     HDR=0
//!     DTL=1
//!     selector.skipPrefix=true
//! ");
//! assert_eq!(config.mapping().count(), 2);
//! assert_eq!(config.setting("skipPrefix"), Some("true"));
//! ```

mod custom;
mod position;
mod prefix;

pub use custom::CustomSelector;
pub use position::PositionSelector;
pub use prefix::PrefixSelector;

use crate::error::ConfigError;
use crate::metadata::RecordType;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Key prefix of strategy settings in a [`SelectorConfig`].
pub const SETTING_PREFIX: &str = "selector.";

/// The selector cannot decide with the data visible so far.
///
/// This is a control signal between a selector and its caller, never an error for the end
/// user: the caller supplies a larger view of the same span and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("type selector needs more lookahead data")]
pub struct NeedMoreData;

/// A bounded view of the characters at the start of the next unclassified span.
#[derive(Debug, Clone, Copy)]
pub struct Lookahead<'a> {
    chars: &'a [char],
    at_end: bool,
}

impl<'a> Lookahead<'a> {
    /// `at_end` tells the selector that no more data exists beyond `chars`.
    #[must_use]
    pub fn new(chars: &'a [char], at_end: bool) -> Self {
        Self { chars, at_end }
    }

    #[must_use]
    pub fn chars(&self) -> &'a [char] {
        self.chars
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Whether the view already reaches the end of input.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.at_end
    }
}

/// Capability contract of a record type selector.
///
/// Call sequence per record: [`reset`](Self::reset), then [`choose`](Self::choose) until it
/// stops answering [`NeedMoreData`], then read [`next_record_type`](Self::next_record_type)
/// and [`next_record_offset`](Self::next_record_offset).
pub trait TypeSelector {
    /// Validate `config` against the metadata pool and prepare lookup state.
    ///
    /// Returns the number of characters the selector usually needs to decide.
    ///
    /// # Errors
    /// Any [`ConfigError`]; these are fatal and never retried.
    fn init(&mut self, pool: &[RecordType], config: &SelectorConfig) -> Result<usize, ConfigError>;

    /// Informative lookahead hint; the selector may still ask for more.
    fn look_ahead_characters(&self) -> usize;

    /// Clear the selection and all transient scratch state.
    fn reset(&mut self);

    /// Classify the span starting at `view`.
    ///
    /// # Errors
    /// [`NeedMoreData`] if `view` is too short; state gathered so far is kept for the retry.
    fn choose(&mut self, view: &Lookahead<'_>) -> Result<(), NeedMoreData>;

    /// Index of the selected record type, `None` if nothing matched.
    fn next_record_type(&self) -> Option<usize>;

    /// Characters to skip from the start of the view before the record body begins.
    fn next_record_offset(&self) -> usize;

    /// Search the view for the next position that plausibly starts a record.
    ///
    /// On `Ok(true)` the position is available through
    /// [`next_record_offset`](Self::next_record_offset). `Ok(false)` means the input ends
    /// without another plausible record.
    ///
    /// # Errors
    /// [`NeedMoreData`] if the search cannot complete within `view`.
    fn recover_to_next_record(&mut self, view: &Lookahead<'_>) -> Result<bool, NeedMoreData>;
}

/// An ordered property list configuring a selector.
///
/// Entry order and duplicate keys are preserved so that duplicates can be reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorConfig {
    entries: Vec<(String, String)>,
}

impl SelectorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.entries.push((key.into(), value.into()));
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mapping entries, settings excluded.
    pub fn mapping(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(k, _)| !k.starts_with(SETTING_PREFIX))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value of the setting `selector.<name>`; the last occurrence wins.
    #[must_use]
    pub fn setting(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.strip_prefix(SETTING_PREFIX) == Some(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse `key=value` lines. Blank lines and lines starting with `#` or `!` are ignored;
    /// `:` is accepted as separator when a line has no `=`.
    #[must_use]
    pub fn parse_properties(text: &str) -> Self {
        let mut config = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let split = line.find('=').or_else(|| line.find(':'));
            match split {
                Some(at) => config.insert(line[..at].trim(), line[at + 1..].trim()),
                None => config.insert(line, ""),
            }
        }
        config
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SelectorConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = Self::new();
        for (k, v) in iter {
            config.insert(k, v);
        }
        config
    }
}

impl Serialize for SelectorConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SelectorConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ConfigVisitor;

        impl<'de> Visitor<'de> for ConfigVisitor {
            type Value = SelectorConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of selector keys to record type indexes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut config = SelectorConfig::new();
                while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    config.insert(key, value);
                }
                Ok(config)
            }
        }

        deserializer.deserialize_map(ConfigVisitor)
    }
}

/// Validated mapping entries: `(key, type index)` in configuration order.
///
/// Shared by the table-driven selectors.
pub(crate) fn parse_mapping(
    config: &SelectorConfig,
    pool: &[RecordType],
) -> Result<Vec<(String, usize)>, ConfigError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (key, value) in config.mapping() {
        if key.is_empty() {
            return Err(ConfigError::EmptyKey);
        }
        if !seen.insert(key) {
            return Err(ConfigError::DuplicateKey {
                key: key.to_string(),
                length: key.chars().count(),
            });
        }
        let index: usize = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidTypeIndex {
                key: key.to_string(),
                value: value.to_string(),
            })?;
        if index >= pool.len() {
            return Err(ConfigError::TypeIndexOutOfRange {
                key: key.to_string(),
                index,
                pool_size: pool.len(),
            });
        }
        out.push((key.to_string(), index));
    }
    if out.is_empty() {
        return Err(ConfigError::EmptyMapping);
    }
    Ok(out)
}

/// Parse an optional boolean setting.
pub(crate) fn bool_setting(
    config: &SelectorConfig,
    name: &'static str,
    setting: &'static str,
) -> Result<Option<bool>, ConfigError> {
    config
        .setting(name)
        .map(|v| match v.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(ConfigError::InvalidSetting {
                setting,
                value: v.to_string(),
            }),
        })
        .transpose()
}

/// Parse an optional unsigned setting.
pub(crate) fn usize_setting(
    config: &SelectorConfig,
    name: &'static str,
    setting: &'static str,
) -> Result<Option<usize>, ConfigError> {
    config
        .setting(name)
        .map(|v| {
            v.trim().parse().map_err(|_| ConfigError::InvalidSetting {
                setting,
                value: v.to_string(),
            })
        })
        .transpose()
}
