//! Change-set triggers.

use serde::Serialize;

use crate::ci::PathPattern;

/// Include/all-except filter over changed file paths.
///
/// A path matching `include` always matches, even when `all_except` would
/// exclude it. A path matched by neither list matches when the trigger has
/// `all_except` patterns (it is outside the excluded area) or no patterns at
/// all, and does not match an include-only trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeTrigger {
    /// Patterns that select a path regardless of `all_except`.
    pub include: Vec<PathPattern>,
    /// Patterns that deselect a path unless it is also included.
    pub all_except: Vec<PathPattern>,
}

impl ChangeTrigger {
    /// Builds a trigger from raw pattern strings.
    pub fn new<I, E, S, T>(include: I, all_except: E) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Ok(Self {
            include: include
                .into_iter()
                .map(|p| PathPattern::new(p.as_ref()))
                .collect::<Result<_, _>>()?,
            all_except: all_except
                .into_iter()
                .map(|p| PathPattern::new(p.as_ref()))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Returns whether a changed path fires this trigger.
    pub fn matches(&self, path: &str) -> bool {
        if self.include.iter().any(|p| p.matches(path)) {
            return true;
        }
        if !self.all_except.is_empty() {
            return !self.all_except.iter().any(|p| p.matches(path));
        }
        self.include.is_empty()
    }
}
