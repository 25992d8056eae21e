//! Term group rows and the CSV-style files they are loaded from.
//!
//! Each row is an ordered list of interchangeable terms; the first term is the
//! canonical label. Row order is preserved because earlier rows win conflicts.

use crate::tokenizer::tokenize;
use csv::{ReaderBuilder, Trim};
use seddit_core::ConfigError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermGroup {
    terms: Vec<String>,
}

impl TermGroup {
    /// Build a group from raw cells. Cells are trimmed and blanks dropped;
    /// returns `None` when nothing is left.
    pub fn new<I, S>(terms: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if terms.is_empty() {
            None
        } else {
            Some(Self { terms })
        }
    }

    pub fn canonical(&self) -> &str {
        &self.terms[0]
    }

    /// Every term of the group, canonical first.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Whether the canonical label is one word: no whitespace, and a single
    /// token once edge punctuation is set aside ("U.S." and "C++" qualify).
    pub fn has_single_token_canonical(&self) -> bool {
        !self.canonical().contains(char::is_whitespace) && tokenize(self.canonical()).len() == 1
    }
}

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Parse every row of `content`. Rows are comma separated; double-quoted
/// cells may hold commas and `""` escapes, and lines starting with `#` are
/// comments. Unreadable rows are skipped with a warning. `source` only
/// labels the warnings.
pub fn parse_term_groups(content: &[u8], source: &str) -> Vec<TermGroup> {
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(content);

    let mut groups = Vec::new();
    for result in reader.records() {
        match result {
            Ok(record) => match TermGroup::new(record.iter()) {
                Some(group) => groups.push(group),
                None => debug!(
                    "{}:{}: row has no terms, skipping",
                    source,
                    record.position().map_or(0, |p| p.line())
                ),
            },
            Err(e) => warn!("{}: skipping unreadable row: {}", source, e),
        }
    }

    groups
}

pub fn load_term_groups(path: &Path) -> Result<Vec<TermGroup>, ConfigError> {
    let content = read_term_file(path)?;
    let groups = parse_term_groups(&content, &path.display().to_string());
    debug!("Loaded {} term groups from {}", groups.len(), path.display());
    Ok(groups)
}

/// Every cell of every row across `paths`, as one flat set.
pub fn load_filtered_words(paths: &[PathBuf]) -> Result<HashSet<String>, ConfigError> {
    let mut words = HashSet::new();
    for path in paths {
        for group in load_term_groups(path)? {
            words.extend(group.terms.into_iter());
        }
    }
    Ok(words)
}

fn read_term_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    std::fs::read(path).map_err(|e| ConfigError::InvalidFormat {
        details: format!("{}: {}", path.display(), e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn canonicals(groups: &[TermGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.canonical()).collect()
    }

    #[test]
    fn test_cells_are_trimmed_and_blanks_dropped() {
        let groups = parse_term_groups(b" Jebediah , Jeb,, Jebediah Kerman \n , ,\n", "test");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].terms(), ["Jebediah", "Jeb", "Jebediah Kerman"]);
    }

    #[test]
    fn test_quoted_cells() {
        let groups = parse_term_groups(br#""Washington, D.C.",DC,"say ""hi""""#, "test");
        assert_eq!(groups[0].terms(), ["Washington, D.C.", "DC", r#"say "hi""#]);
    }

    #[test]
    fn test_keeps_order_and_skips_comments_and_bad_rows() {
        let content = b"\xef\xbb\xbfMun,Moon\n\n# planets\n\xff\xfe,broken\nDuna,Red Planet\n";
        let groups = parse_term_groups(content, "test");
        assert_eq!(canonicals(&groups), vec!["Mun", "Duna"]);
        assert_eq!(groups[1].terms(), ["Duna", "Red Planet"]);
    }

    #[test]
    fn test_rows_may_differ_in_length() {
        let groups = parse_term_groups(b"A\nB,b1,b2,b3\nC,c1\n", "test");
        assert_eq!(canonicals(&groups), vec!["A", "B", "C"]);
        assert_eq!(groups[1].terms().len(), 4);
    }

    #[test]
    fn test_single_token_canonical() {
        assert!(TermGroup::new(["KSP", "Kerbal Space Program"])
            .unwrap()
            .has_single_token_canonical());
        assert!(!TermGroup::new(["New York", "NYC"])
            .unwrap()
            .has_single_token_canonical());
        assert!(!TermGroup::new(["C-3PO"]).unwrap().has_single_token_canonical());
        assert!(TermGroup::new(["U.S.", "USA"]).unwrap().has_single_token_canonical());
        assert!(TermGroup::new(["C++"]).unwrap().has_single_token_canonical());
        assert!(TermGroup::new(["Mun!"]).unwrap().has_single_token_canonical());
        assert!(!TermGroup::new(["++"]).unwrap().has_single_token_canonical());
    }

    #[test]
    fn test_load_filtered_words_flattens_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "the,a,an").unwrap();
        writeln!(file, "of, to").unwrap();

        let words = load_filtered_words(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(words.len(), 5);
        assert!(words.contains("to"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_term_groups(Path::new("/nonexistent/groups.csv"));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }
}
