//! Term frequency analysis over post titles.
//!
//! Titles pass through a [`TermFilter`], are canonicalized by a
//! [`TermGroupResolver`] and counted by a [`FrequencyAnalyzer`] into a ranked
//! [`ScoreTable`].

pub mod analyzer;
pub mod filter;
pub mod groups;
pub mod resolver;
pub mod tokenizer;

pub use analyzer::{AnalysisOptions, FrequencyAnalyzer, ScoreEntry, ScoreTable};
pub use filter::{compile_pattern, TermFilter};
pub use groups::{load_filtered_words, load_term_groups, parse_term_groups, TermGroup};
pub use resolver::{ResolvedTerm, ResolverMode, TermGroupResolver};
pub use tokenizer::{tokenize, Token};
