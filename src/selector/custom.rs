//! Selection by user closures.

use super::{Lookahead, NeedMoreData, SelectorConfig, TypeSelector};
use crate::error::ConfigError;
use crate::metadata::RecordType;
use log::warn;
use std::fmt;

/// Decision of a custom choose function: `(type index, offset)`, or `None` for no match.
pub type Choice = Option<(usize, usize)>;

type ChooseFn = dyn FnMut(&Lookahead<'_>) -> Result<Choice, NeedMoreData> + Send;
type RecoverFn = dyn FnMut(&Lookahead<'_>) -> Result<Option<usize>, NeedMoreData> + Send;

/// A selector whose decisions come from closures.
///
/// ```
/// use flatbeam::selector::{CustomSelector, Lookahead, TypeSelector};
///
/// // odd digit first: type 1, otherwise type 0
/// let mut selector = CustomSelector::new(1, |view: &Lookahead<'_>| {
///     let first = view.chars().first().and_then(|c| c.to_digit(10));
///     Ok(first.map(|d| ((d % 2) as usize, 0)))
/// });
/// # let _ = &mut selector;
/// ```
pub struct CustomSelector {
    choose_fn: Box<ChooseFn>,
    recover_fn: Option<Box<RecoverFn>>,
    look_ahead: usize,
    pool_size: usize,

    selected: Option<usize>,
    offset: usize,
}

impl fmt::Debug for CustomSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomSelector")
            .field("look_ahead", &self.look_ahead)
            .field("recovers", &self.recover_fn.is_some())
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl CustomSelector {
    /// A selector asking `choose` for a decision on views of at least `look_ahead` characters.
    pub fn new<F>(look_ahead: usize, choose: F) -> Self
    where
        F: FnMut(&Lookahead<'_>) -> Result<Choice, NeedMoreData> + Send + 'static,
    {
        Self {
            choose_fn: Box::new(choose),
            recover_fn: None,
            look_ahead,
            pool_size: 0,
            selected: None,
            offset: 0,
        }
    }

    /// Add a recovery function returning the offset of the next plausible record.
    #[must_use]
    pub fn with_recovery<F>(mut self, recover: F) -> Self
    where
        F: FnMut(&Lookahead<'_>) -> Result<Option<usize>, NeedMoreData> + Send + 'static,
    {
        self.recover_fn = Some(Box::new(recover));
        self
    }
}

impl TypeSelector for CustomSelector {
    fn init(&mut self, pool: &[RecordType], _config: &SelectorConfig) -> Result<usize, ConfigError> {
        if pool.is_empty() {
            return Err(ConfigError::InvalidMetadata("metadata pool is empty".into()));
        }
        self.pool_size = pool.len();
        self.reset();
        Ok(self.look_ahead)
    }

    fn look_ahead_characters(&self) -> usize {
        self.look_ahead
    }

    fn reset(&mut self) {
        self.selected = None;
        self.offset = 0;
    }

    fn choose(&mut self, view: &Lookahead<'_>) -> Result<(), NeedMoreData> {
        let choice = (self.choose_fn)(view)?;
        match choice {
            Some((index, _)) if index >= self.pool_size => {
                warn!(
                    "custom selector chose type {index} outside a pool of {}",
                    self.pool_size
                );
                self.selected = None;
                self.offset = 0;
            }
            Some((index, offset)) => {
                self.selected = Some(index);
                self.offset = offset;
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
        let Some(recover) = self.recover_fn.as_mut() else {
            return Ok(false);
        };
        match recover(view)? {
            Some(offset) if offset > 0 => {
                self.offset = offset;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
