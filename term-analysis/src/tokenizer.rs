/// A word inside a title, with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '\'' | '\u{2019}')
}

pub(crate) fn is_edge_char(c: char) -> bool {
    matches!(c, '.' | '\'' | '\u{2019}')
}

/// Split `text` into runs of word characters. Dots and apostrophes are kept
/// inside a word ("v1.2", "don't") but trimmed from its edges.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut run_start = None;

    for (i, c) in text.char_indices() {
        if is_word_char(c) {
            if run_start.is_none() {
                run_start = Some(i);
            }
        } else if let Some(start) = run_start.take() {
            push_trimmed(text, start, i, &mut tokens);
        }
    }
    if let Some(start) = run_start {
        push_trimmed(text, start, text.len(), &mut tokens);
    }

    tokens
}

fn push_trimmed<'a>(text: &'a str, start: usize, end: usize, tokens: &mut Vec<Token<'a>>) {
    let raw = &text[start..end];
    let leading = raw.trim_start_matches(is_edge_char);
    let offset = start + (raw.len() - leading.len());
    let word = leading.trim_end_matches(is_edge_char);
    if word.is_empty() {
        return;
    }
    tokens.push(Token {
        text: word,
        start: offset,
        end: offset + word.len(),
    });
}

/// Key used to compare words under the active case rule.
pub fn fold(word: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        word.to_string()
    } else {
        word.to_lowercase()
    }
}

/// The non-whitespace characters of `text[from..to]`.
pub(crate) fn marks(text: &str, from: usize, to: usize) -> String {
    text[from..to].chars().filter(|c| !c.is_whitespace()).collect()
}

/// The marks separating two tokens of the same text. Phrases compare gaps
/// this way, so "New York" needs an empty gap while "Washington, D.C." needs
/// a single comma.
pub(crate) fn gap_between(text: &str, left: &Token<'_>, right: &Token<'_>) -> String {
    marks(text, left.end, right.start)
}
