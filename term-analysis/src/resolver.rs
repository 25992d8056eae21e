//! Canonicalization of title words through term groups.
//!
//! Every term of every group is compiled into a phrase: a sequence of folded
//! tokens plus the punctuation expected between and around them, so "C++"
//! needs its pluses and never matches a bare "C". Phrases are bucketed by
//! their first token and tried longest first, so "New York City" is matched
//! before "New York" and "C++" before "C" at the same position.

use crate::groups::TermGroup;
use crate::tokenizer::{fold, gap_between, is_edge_char, marks, tokenize, Token};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverMode {
    /// Every word is counted; grouped words collapse into their canonical term.
    GroupSubstitution,
    /// Only configured canonical phrases are counted.
    SearchTerms,
}

/// One counted word after substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTerm {
    /// Tally key under the active case rule.
    pub key: String,
    /// Text reported for the key when it is first seen.
    pub label: String,
}

#[derive(Debug, Clone)]
struct Phrase {
    tokens: Vec<String>,
    gaps: Vec<String>,
    /// Marks required right before the first token, such as the `#` of "#rust".
    lead: String,
    /// Marks required right after the last token, such as the `++` of "C++".
    trail: String,
    group: usize,
}

type PhraseShape = (Vec<String>, Vec<String>, String, String);

impl Phrase {
    fn len(&self) -> usize {
        self.tokens.len()
    }

    fn edge_len(&self) -> usize {
        self.lead.len() + self.trail.len()
    }

    fn shape(&self) -> PhraseShape {
        (
            self.tokens.clone(),
            self.gaps.clone(),
            self.lead.clone(),
            self.trail.clone(),
        )
    }

    fn matches_at(
        &self,
        title: &str,
        tokens: &[Token<'_>],
        folded: &[String],
        start: usize,
    ) -> bool {
        let end = start + self.len();
        if end > tokens.len() || folded[start..end] != self.tokens[..] {
            return false;
        }
        let gaps_match = self.gaps.iter().enumerate().all(|(i, gap)| {
            gap_between(title, &tokens[start + i], &tokens[start + i + 1]) == *gap
        });
        if !gaps_match {
            return false;
        }

        let before = start.checked_sub(1).map_or(0, |i| tokens[i].end);
        let after = tokens.get(end).map_or(title.len(), |t| t.start);
        let lead = marks(title, before, tokens[start].start);
        let trail = marks(title, tokens[end - 1].end, after);
        lead.trim_end_matches(is_edge_char).ends_with(self.lead.as_str())
            && trail.trim_start_matches(is_edge_char).starts_with(self.trail.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TermGroupResolver {
    mode: ResolverMode,
    case_sensitive: bool,
    canonicals: Vec<String>,
    phrases: HashMap<String, Vec<Phrase>>,
}

impl TermGroupResolver {
    /// Group mode with no groups: every word counts as itself.
    pub fn all_words(case_sensitive: bool) -> Self {
        Self::group_substitution(&[], case_sensitive)
    }

    /// Groups whose canonical term is not a single word are skipped, since
    /// the canonical replaces the matched words in the token stream.
    pub fn group_substitution(groups: &[TermGroup], case_sensitive: bool) -> Self {
        let usable = groups.iter().filter(|group| {
            let single = group.has_single_token_canonical();
            if !single {
                warn!(
                    "Term group '{}' skipped: canonical term must be a single word",
                    group.canonical()
                );
            }
            single
        });
        Self::build(ResolverMode::GroupSubstitution, usable, case_sensitive)
    }

    /// Search terms are always matched case-insensitively.
    pub fn search_terms(groups: &[TermGroup]) -> Self {
        Self::build(ResolverMode::SearchTerms, groups.iter(), false)
    }

    fn build<'g>(
        mode: ResolverMode,
        groups: impl Iterator<Item = &'g TermGroup>,
        case_sensitive: bool,
    ) -> Self {
        let mut resolver = Self {
            mode,
            case_sensitive,
            canonicals: Vec::new(),
            phrases: HashMap::new(),
        };
        let mut claimed: HashSet<PhraseShape> = HashSet::new();

        for group in groups {
            let index = resolver.canonicals.len();
            resolver.canonicals.push(group.canonical().to_string());

            for term in group.terms() {
                let Some(phrase) = resolver.compile_phrase(term, index) else {
                    continue;
                };
                if !claimed.insert(phrase.shape()) {
                    debug!(
                        "Term '{}' already claimed by an earlier group, ignored for '{}'",
                        term,
                        group.canonical()
                    );
                    continue;
                }
                resolver
                    .phrases
                    .entry(phrase.tokens[0].clone())
                    .or_default()
                    .push(phrase);
            }
        }

        for bucket in resolver.phrases.values_mut() {
            // Stable, so equal shapes keep group order.
            bucket.sort_by(|a, b| {
                b.len()
                    .cmp(&a.len())
                    .then_with(|| b.edge_len().cmp(&a.edge_len()))
            });
        }

        debug!(
            "Term resolver ready: {:?} mode, {} groups",
            resolver.mode,
            resolver.canonicals.len()
        );
        resolver
    }

    fn compile_phrase(&self, term: &str, group: usize) -> Option<Phrase> {
        let tokens = tokenize(term);
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            warn!("Term '{}' contains no words and is ignored", term);
            return None;
        };
        Some(Phrase {
            gaps: tokens
                .windows(2)
                .map(|pair| gap_between(term, &pair[0], &pair[1]))
                .collect(),
            lead: marks(term, 0, first.start)
                .trim_matches(is_edge_char)
                .to_string(),
            trail: marks(term, last.end, term.len())
                .trim_matches(is_edge_char)
                .to_string(),
            tokens: tokens
                .iter()
                .map(|t| fold(t.text, self.case_sensitive))
                .collect(),
            group,
        })
    }

    pub fn mode(&self) -> ResolverMode {
        self.mode
    }

    /// Canonical terms in configuration order.
    pub fn canonicals(&self) -> &[String] {
        &self.canonicals
    }

    pub fn key_for(&self, text: &str) -> String {
        fold(text, self.case_sensitive)
    }

    /// Tokenize `title` and collapse grouped words and phrases into their
    /// canonical terms. Ungrouped words are reported as written.
    pub fn resolve_tokens(&self, title: &str) -> Vec<ResolvedTerm> {
        let tokens = tokenize(title);
        let folded = self.fold_tokens(&tokens);
        let mut resolved = Vec::with_capacity(tokens.len());
        let mut i = 0;

        while i < tokens.len() {
            match self.longest_match(title, &tokens, &folded, i) {
                Some(phrase) => {
                    let canonical = &self.canonicals[phrase.group];
                    resolved.push(ResolvedTerm {
                        key: self.key_for(canonical),
                        label: canonical.clone(),
                    });
                    i += phrase.len();
                }
                None => {
                    resolved.push(ResolvedTerm {
                        key: folded[i].clone(),
                        label: tokens[i].text.to_string(),
                    });
                    i += 1;
                }
            }
        }

        resolved
    }

    /// Group index of every phrase found in `title`, left to right. Matches
    /// never overlap, and unmatched words are skipped.
    pub fn scan_phrases(&self, title: &str) -> Vec<usize> {
        let tokens = tokenize(title);
        let folded = self.fold_tokens(&tokens);
        let mut found = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            match self.longest_match(title, &tokens, &folded, i) {
                Some(phrase) => {
                    found.push(phrase.group);
                    i += phrase.len();
                }
                None => i += 1,
            }
        }

        found
    }

    fn fold_tokens(&self, tokens: &[Token<'_>]) -> Vec<String> {
        tokens
            .iter()
            .map(|t| fold(t.text, self.case_sensitive))
            .collect()
    }

    fn longest_match(
        &self,
        title: &str,
        tokens: &[Token<'_>],
        folded: &[String],
        start: usize,
    ) -> Option<&Phrase> {
        self.phrases
            .get(&folded[start])?
            .iter()
            .find(|phrase| phrase.matches_at(title, tokens, folded, start))
    }
}
