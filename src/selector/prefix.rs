//! Selection by record prefix.
//!
//! Each mapping key is a literal prefix of the record; its value is the record type index.
//! Prefixes of different lengths may coexist and the longest matching prefix wins: with
//! `A=0` and `AB=1`, `"ABxx"` selects type 1 and `"ACxx"` selects type 0.
//!
//! Setting `selector.skipPrefix=true` makes the matched prefix a record tag that is skipped
//! before the record body is decoded.

use super::{Lookahead, NeedMoreData, SelectorConfig, TypeSelector, bool_setting, parse_mapping};
use crate::error::ConfigError;
use crate::metadata::RecordType;
use log::{debug, trace};
use std::collections::{BTreeMap, HashMap};

/// Record type selector keyed by the leading characters of a record.
#[derive(Debug, Clone, Default)]
pub struct PrefixSelector {
    /// Prefix tables by prefix length in characters, ascending.
    tables: BTreeMap<usize, HashMap<String, usize>>,
    max_len: usize,
    skip_prefix: bool,

    /// Characters gathered from earlier views of the current span.
    gathered: Vec<char>,
    /// First recovery start offset not yet ruled out.
    recover_from: usize,
    selected: Option<usize>,
    offset: usize,
}

impl PrefixSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key_of(chars: &[char]) -> String {
        chars.iter().collect()
    }

    /// Longest prefix match at the start of `chars`, as `(type index, prefix length)`.
    fn longest_match(&self, chars: &[char]) -> Option<(usize, usize)> {
        let mut found = None;
        for (&len, table) in &self.tables {
            if len > chars.len() {
                break;
            }
            if let Some(&index) = table.get(&Self::key_of(&chars[..len])) {
                found = Some((index, len));
            }
        }
        found
    }
}

impl TypeSelector for PrefixSelector {
    fn init(&mut self, pool: &[RecordType], config: &SelectorConfig) -> Result<usize, ConfigError> {
        let mapping = parse_mapping(config, pool)?;
        self.tables.clear();
        for (key, index) in mapping {
            self.tables
                .entry(key.chars().count())
                .or_default()
                .insert(key, index);
        }
        self.max_len = self.tables.keys().next_back().copied().unwrap_or(0);
        self.skip_prefix = bool_setting(config, "skipPrefix", "selector.skipPrefix")?.unwrap_or(false);
        self.reset();
        debug!(
            "prefix selector: {} prefix lengths, longest {}, skip prefix {}",
            self.tables.len(),
            self.max_len,
            self.skip_prefix
        );
        Ok(self.max_len)
    }

    fn look_ahead_characters(&self) -> usize {
        self.max_len
    }

    fn reset(&mut self) {
        self.gathered.clear();
        self.recover_from = 1;
        self.selected = None;
        self.offset = 0;
    }

    fn choose(&mut self, view: &Lookahead<'_>) -> Result<(), NeedMoreData> {
        let have = self.gathered.len();
        let upto = view.len().min(self.max_len);
        if upto > have {
            self.gathered.extend_from_slice(&view.chars()[have..upto]);
        }
        if self.gathered.len() < self.max_len && !view.at_end() {
            trace!(
                "prefix selector has {} of {} characters",
                self.gathered.len(),
                self.max_len
            );
            return Err(NeedMoreData);
        }

        match self.longest_match(&self.gathered) {
            Some((index, len)) => {
                self.selected = Some(index);
                self.offset = if self.skip_prefix { len } else { 0 };
            }
            None => {
                self.selected = None;
                self.offset = 0;
            }
        }
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
        let mut start = self.recover_from.max(1);
        while start <= chars.len() {
            let rest = &chars[start..];
            let mut incomplete = false;
            for (&len, table) in &self.tables {
                if len > rest.len() {
                    incomplete = true;
                    break;
                }
                if table.contains_key(&Self::key_of(&rest[..len])) {
                    debug!("prefix selector recovered {start} characters ahead");
                    self.offset = start;
                    self.recover_from = 1;
                    return Ok(true);
                }
            }
            if incomplete && !view.at_end() {
                self.recover_from = start;
                return Err(NeedMoreData);
            }
            start += 1;
        }
        self.recover_from = 1;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldDescriptor;

    fn pool(n: usize) -> Vec<RecordType> {
        (0..n)
            .map(|i| RecordType::new(format!("T{i}"), vec![FieldDescriptor::text("f", 1)]))
            .collect()
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_gathered_characters_survive_retries() {
        let mut sel = PrefixSelector::new();
        let config = SelectorConfig::new().with("ABC", "0");
        sel.init(&pool(1), &config).unwrap();
        sel.reset();

        let first = chars("AB");
        assert_eq!(sel.choose(&Lookahead::new(&first, false)), Err(NeedMoreData));
        assert_eq!(sel.gathered.len(), 2);

        let second = chars("ABCD");
        sel.choose(&Lookahead::new(&second, false)).unwrap();
        assert_eq!(sel.next_record_type(), Some(0));
    }

    #[test]
    fn test_recovery_resumes_after_underflow() {
        let mut sel = PrefixSelector::new();
        let config = SelectorConfig::new().with("XYZ", "0");
        sel.init(&pool(1), &config).unwrap();

        let short = chars("..XY");
        assert_eq!(
            sel.recover_to_next_record(&Lookahead::new(&short, false)),
            Err(NeedMoreData)
        );
        assert_eq!(sel.recover_from, 2);

        let long = chars("..XYZ");
        assert_eq!(sel.recover_to_next_record(&Lookahead::new(&long, false)), Ok(true));
        assert_eq!(sel.next_record_offset(), 2);
    }
}
