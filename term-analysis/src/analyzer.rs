use crate::filter::TermFilter;
use crate::resolver::{ResolverMode, TermGroupResolver};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub label: String,
    pub count: u64,
}

/// Ranked analysis output: count descending, ties in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreTable {
    entries: Vec<ScoreEntry>,
}

impl ScoreTable {
    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreEntry> {
        self.entries.iter()
    }

    /// `(label, count)` pairs, mostly for assertions and printing.
    pub fn as_pairs(&self) -> Vec<(&str, u64)> {
        self.entries
            .iter()
            .map(|e| (e.label.as_str(), e.count))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Entries counted fewer times than this are dropped.
    pub threshold: u64,
    /// Keep at most this many entries; `None` keeps all.
    pub rank_cutoff: Option<usize>,
}

/// Running counts keyed by canonical term. Entries are appended on first
/// sighting, so their position is the first-seen order.
#[derive(Debug, Default)]
struct Tally {
    index: HashMap<String, usize>,
    entries: Vec<ScoreEntry>,
}

impl Tally {
    fn add(&mut self, key: &str, label: &str, amount: u64) {
        match self.index.get(key) {
            Some(&slot) => self.entries[slot].count += amount,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push(ScoreEntry {
                    label: label.to_string(),
                    count: amount,
                });
            }
        }
    }

    fn bump(&mut self, key: &str, label: &str) {
        self.add(key, label, 1);
    }
}

pub struct FrequencyAnalyzer {
    filter: TermFilter,
    resolver: TermGroupResolver,
    options: AnalysisOptions,
}

impl FrequencyAnalyzer {
    pub fn new(filter: TermFilter, resolver: TermGroupResolver, options: AnalysisOptions) -> Self {
        Self {
            filter,
            resolver,
            options,
        }
    }

    pub fn mode(&self) -> ResolverMode {
        self.resolver.mode()
    }

    pub fn analyze<I, S>(&self, titles: I) -> ScoreTable
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tally = Tally::default();
        let mut seen = 0usize;
        let mut skipped = 0usize;

        for title in titles {
            let title = title.as_ref();
            seen += 1;
            if !self.filter.is_title_allowed(title) {
                skipped += 1;
                continue;
            }

            match self.resolver.mode() {
                ResolverMode::GroupSubstitution => self.count_words(title, &mut tally),
                ResolverMode::SearchTerms => self.count_phrases(title, &mut tally),
            }
        }

        if self.resolver.mode() == ResolverMode::SearchTerms && self.options.threshold == 0 {
            // Unmatched search terms are still listed, after every match.
            for canonical in self.resolver.canonicals() {
                tally.add(&self.resolver.key_for(canonical), canonical, 0);
            }
        }

        let mut entries: Vec<ScoreEntry> = tally
            .entries
            .into_iter()
            .filter(|e| e.count >= self.options.threshold)
            .collect();
        // Stable sort keeps first-seen order among equal counts.
        entries.sort_by(|a, b| b.count.cmp(&a.count));
        if let Some(cutoff) = self.options.rank_cutoff {
            entries.truncate(cutoff);
        }

        debug!(
            "Analyzed {} titles ({} skipped by title rules), {} ranked terms",
            seen,
            skipped,
            entries.len()
        );
        ScoreTable { entries }
    }

    fn count_words(&self, title: &str, tally: &mut Tally) {
        for term in self.resolver.resolve_tokens(title) {
            if self.filter.is_word_allowed(&term.label) {
                tally.bump(&term.key, &term.label);
            }
        }
    }

    fn count_phrases(&self, title: &str, tally: &mut Tally) {
        for group in self.resolver.scan_phrases(title) {
            let canonical = &self.resolver.canonicals()[group];
            tally.bump(&self.resolver.key_for(canonical), canonical);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::TermGroup;

    fn analyzer(resolver: TermGroupResolver, threshold: u64, cutoff: Option<usize>) -> FrequencyAnalyzer {
        FrequencyAnalyzer::new(
            TermFilter::allow_all(),
            resolver,
            AnalysisOptions {
                threshold,
                rank_cutoff: cutoff,
            },
        )
    }

    #[test]
    fn test_counts_every_occurrence() {
        let table = analyzer(TermGroupResolver::all_words(false), 0, None).analyze(["KSP Mun Duna KSP"]);
        assert_eq!(table.as_pairs(), vec![("KSP", 2), ("Mun", 1), ("Duna", 1)]);
    }

    #[test]
    fn test_zero_rank_cutoff_is_empty() {
        let table = analyzer(TermGroupResolver::all_words(false), 0, Some(0)).analyze(["a b"]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_search_terms_list_unmatched_last() {
        let groups = vec![
            TermGroup::new(["Jool"]).unwrap(),
            TermGroup::new(["Mun", "moon"]).unwrap(),
        ];
        let resolver = TermGroupResolver::search_terms(&groups);

        let table = analyzer(resolver.clone(), 0, None).analyze(["the moon and the MUN"]);
        assert_eq!(table.as_pairs(), vec![("Mun", 2), ("Jool", 0)]);

        let table = analyzer(resolver, 1, None).analyze(["the moon and the MUN"]);
        assert_eq!(table.as_pairs(), vec![("Mun", 2)]);
    }

    #[test]
    fn test_filtered_words_are_not_counted() {
        let filter = TermFilter::new(
            &seddit_core::RegexSettings::default(),
            vec!["the".to_string()],
            false,
        )
        .unwrap();
        let analyzer = FrequencyAnalyzer::new(
            filter,
            TermGroupResolver::all_words(false),
            AnalysisOptions::default(),
        );
        let table = analyzer.analyze(["The Mun", "the Minmus"]);
        assert_eq!(table.as_pairs(), vec![("Mun", 1), ("Minmus", 1)]);
    }
}
