//! Parser configuration files.
//!
//! A [`ParserConfig`] describes a complete parser in JSON: the [`ParserSettings`] (flattened
//! into the top level), the record pool and, for multi-level input, the selector.
//!
//! ```
//! use flatbeam::config::ParserConfig;
//!
//! let config = ParserConfig::from_json_str(r#"{
//!     "charset": "windows-1252",
//!     "mode": "char",
//!     "policy": "lenient",
//!     "pool": [
//!         { "name": "header", "fields": [{ "name": "tag", "length": 3 }, { "name": "date", "length": 8 }] },
//!         { "name": "detail", "fields": [{ "name": "tag", "length": 3 }, { "name": "amount", "length": 10 }] }
//!     ],
//!     "selector": { "kind": "prefix", "properties": { "HDR": 0, "DTL": 1 } }
//! }"#).unwrap();
//! let parser = config.build_multi_level().unwrap();
//! assert_eq!(parser.look_ahead(), 3);
//! ```

use crate::error::ConfigError;
use crate::metadata::RecordType;
use crate::parser::{DataParser, FixLenParser, MultiLevelParser, ParserSettings};
use crate::selector::{PositionSelector, PrefixSelector, SelectorConfig, TypeSelector};
use anyhow::{Context, Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Built-in selector strategies available from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    #[default]
    Prefix,
    Position,
}

impl SelectorKind {
    #[must_use]
    pub fn create(self) -> Box<dyn TypeSelector> {
        match self {
            Self::Prefix => Box::new(PrefixSelector::new()),
            Self::Position => Box::new(PositionSelector::new()),
        }
    }
}

/// Selector section of a [`ParserConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectorSection {
    #[serde(default)]
    pub kind: SelectorKind,
    /// Inline `key → type index` entries and `selector.*` settings.
    #[serde(default)]
    pub properties: SelectorConfig,
    /// A `key=value` properties file, appended after the inline entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties_file: Option<PathBuf>,
}

impl SelectorSection {
    /// Inline properties followed by the entries of the properties file, if any.
    ///
    /// # Errors
    /// If the properties file cannot be read.
    pub fn resolve_properties(&self) -> Result<SelectorConfig> {
        let mut properties = self.properties.clone();
        if let Some(path) = &self.properties_file {
            let text = fs::read_to_string(path)
                .with_context(|| format!("read selector properties {}", path.display()))?;
            for (key, value) in SelectorConfig::parse_properties(&text).entries() {
                properties.insert(key.clone(), value.clone());
            }
        }
        Ok(properties)
    }
}

/// Serde description of a complete parser.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(flatten)]
    pub settings: ParserSettings,
    pub pool: Vec<RecordType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<SelectorSection>,
}

impl ParserConfig {
    /// # Errors
    /// If `json` is not a valid configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parse parser configuration")
    }

    /// Load a JSON configuration file.
    ///
    /// A relative `properties_file` is resolved against the directory of `path`.
    ///
    /// # Errors
    /// If the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&json)
            .with_context(|| format!("parse parser configuration {}", path.display()))?;
        if let Some(file) = config
            .selector
            .as_mut()
            .and_then(|s| s.properties_file.as_mut())
            && file.is_relative()
            && let Some(dir) = path.parent()
        {
            *file = dir.join(&*file);
        }
        debug!("loaded parser configuration {}", path.display());
        Ok(config)
    }

    /// Serialize as pretty-printed JSON.
    ///
    /// # Errors
    /// If serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize parser configuration")
    }

    /// A parser for a single-type pool.
    ///
    /// # Errors
    /// [`ConfigError::InvalidMetadata`] unless the pool has exactly one type, and any error
    /// of [`FixLenParser::new`].
    pub fn build_fixlen(&self) -> std::result::Result<FixLenParser, ConfigError> {
        let [record_type] = self.pool.as_slice() else {
            return Err(ConfigError::InvalidMetadata(format!(
                "a single-type parser needs exactly one record type, found {}",
                self.pool.len()
            )));
        };
        FixLenParser::new(record_type.clone(), self.settings.clone())
    }

    /// A parser classifying records with the configured selector.
    ///
    /// # Errors
    /// If the selector section is missing, its properties file unreadable, or the
    /// configuration invalid.
    pub fn build_multi_level(&self) -> Result<MultiLevelParser> {
        let Some(section) = &self.selector else {
            bail!("a multi-level parser needs a selector section");
        };
        let properties = section.resolve_properties()?;
        let parser = MultiLevelParser::new(
            self.pool.clone(),
            section.kind.create(),
            &properties,
            self.settings.clone(),
        )
        .context("configure multi-level parser")?;
        Ok(parser)
    }

    /// The parser this configuration describes: multi-level with a selector section,
    /// single-type otherwise.
    ///
    /// # Errors
    /// As [`build_fixlen`](Self::build_fixlen) and
    /// [`build_multi_level`](Self::build_multi_level).
    pub fn build(&self) -> Result<Box<dyn DataParser>> {
        if self.selector.is_some() {
            return Ok(Box::new(self.build_multi_level()?));
        }
        let parser = self.build_fixlen().context("configure single-type parser")?;
        Ok(Box::new(parser))
    }
}
