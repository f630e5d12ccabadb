//! Selection by a type code at a fixed character position.
//!
//! Settings:
//! - `selector.position` - character offset of the code within the record (default 0)
//! - `selector.length` - length of the code; inferred when every key has the same length
//!
//! Every other entry maps a code to a record type index.

use super::{Lookahead, NeedMoreData, SelectorConfig, TypeSelector, parse_mapping, usize_setting};
use crate::error::ConfigError;
use crate::metadata::RecordType;
use log::{debug, trace};
use std::collections::HashMap;

/// Record type selector keyed by a code at a fixed position inside the record.
#[derive(Debug, Clone, Default)]
pub struct PositionSelector {
    codes: HashMap<String, usize>,
    position: usize,
    length: usize,

    selected: Option<usize>,
    offset: usize,
}

impl PositionSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn window(&self) -> usize {
        self.position + self.length
    }

    fn code_at(&self, chars: &[char], start: usize) -> Option<usize> {
        let from = start + self.position;
        let code: String = chars.get(from..from + self.length)?.iter().collect();
        self.codes.get(&code).copied()
    }
}

impl TypeSelector for PositionSelector {
    fn init(&mut self, pool: &[RecordType], config: &SelectorConfig) -> Result<usize, ConfigError> {
        let mapping = parse_mapping(config, pool)?;
        self.position = usize_setting(config, "position", "selector.position")?.unwrap_or(0);

        let length = match usize_setting(config, "length", "selector.length")? {
            Some(0) => {
                return Err(ConfigError::InvalidSetting {
                    setting: "selector.length",
                    value: "0".into(),
                });
            }
            Some(length) => length,
            None => {
                let first = mapping[0].0.chars().count();
                if mapping.iter().any(|(k, _)| k.chars().count() != first) {
                    return Err(ConfigError::MissingSetting("selector.length"));
                }
                first
            }
        };
        if let Some((key, _)) = mapping.iter().find(|(k, _)| k.chars().count() != length) {
            return Err(ConfigError::InvalidSetting {
                setting: "selector.length",
                value: format!("{length} (key '{key}' differs)"),
            });
        }
        self.length = length;
        self.codes = mapping.into_iter().collect();
        self.reset();
        debug!(
            "position selector: {} codes of length {} at {}",
            self.codes.len(),
            self.length,
            self.position
        );
        Ok(self.window())
    }

    fn look_ahead_characters(&self) -> usize {
        self.window()
    }

    fn reset(&mut self) {
        self.selected = None;
        self.offset = 0;
    }

    fn choose(&mut self, view: &Lookahead<'_>) -> Result<(), NeedMoreData> {
        if view.len() < self.window() && !view.at_end() {
            trace!("position selector has {} of {} characters", view.len(), self.window());
            return Err(NeedMoreData);
        }
        self.selected = self.code_at(view.chars(), 0);
        self.offset = 0;
        Ok(())
    }

    fn next_record_type(&self) -> Option<usize> {
        self.selected
    }

    fn next_record_offset(&self) -> usize {
        self.offset
    }

    fn recover_to_next_record(&mut self, view: &Lookahead<'_>) -> Result<bool, NeedMoreData> {
        let chars = view.chars();
        let mut start = 1;
        loop {
            if start + self.window() > chars.len() {
                if view.at_end() {
                    return Ok(false);
                }
                return Err(NeedMoreData);
            }
            if self.code_at(chars, start).is_some() {
                debug!("position selector recovered {start} characters ahead");
                self.offset = start;
                return Ok(true);
            }
            start += 1;
        }
    }
}
