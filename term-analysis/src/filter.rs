//! Inclusion rules for titles and words.
//!
//! Both granularities use the same precedence: an ignore match always
//! excludes; otherwise a configured require pattern must match; with neither
//! configured everything passes.

use crate::tokenizer::fold;
use regex::Regex;
use seddit_core::{ConfigError, RegexSettings};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct TermFilter {
    filtered_words: HashSet<String>,
    case_sensitive: bool,
    ignore_title: Option<Regex>,
    require_title: Option<Regex>,
    ignore_word: Option<Regex>,
    require_word: Option<Regex>,
}

impl TermFilter {
    /// A filter that lets every title and word through.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Compile every configured pattern. Fails on the first invalid one.
    pub fn new<I>(
        rules: &RegexSettings,
        filtered_words: I,
        case_sensitive: bool,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        Ok(Self {
            filtered_words: filtered_words
                .into_iter()
                .map(|word| fold(word.trim(), case_sensitive))
                .filter(|word| !word.is_empty())
                .collect(),
            case_sensitive,
            ignore_title: compile_pattern("ignore_title", rules.ignore_title.as_deref())?,
            require_title: compile_pattern("require_title", rules.require_title.as_deref())?,
            ignore_word: compile_pattern("ignore_word", rules.ignore_word.as_deref())?,
            require_word: compile_pattern("require_word", rules.require_word.as_deref())?,
        })
    }

    pub fn is_title_allowed(&self, title: &str) -> bool {
        passes(title, self.require_title.as_ref(), self.ignore_title.as_ref())
    }

    pub fn is_word_allowed(&self, word: &str) -> bool {
        if self.filtered_words.contains(&fold(word, self.case_sensitive)) {
            return false;
        }
        passes(word, self.require_word.as_ref(), self.ignore_word.as_ref())
    }

    pub fn filtered_word_count(&self) -> usize {
        self.filtered_words.len()
    }
}

/// Compile a user pattern; blank patterns count as unset.
pub fn compile_pattern(field: &str, pattern: Option<&str>) -> Result<Option<Regex>, ConfigError> {
    match pattern.filter(|p| !p.trim().is_empty()) {
        None => Ok(None),
        Some(pattern) => Regex::new(pattern)
            .map(Some)
            .map_err(|e| ConfigError::InvalidPattern {
                field: field.to_string(),
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }),
    }
}

fn passes(text: &str, require: Option<&Regex>, ignore: Option<&Regex>) -> bool {
    if ignore.is_some_and(|re| re.is_match(text)) {
        return false;
    }
    require.map_or(true, |re| re.is_match(text))
}
