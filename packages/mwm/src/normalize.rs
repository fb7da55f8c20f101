//! Text normalization for the search index.
//!
//! The same pipeline runs when names are indexed and when queries are
//! tokenized, so "Whiskey-Bar" and "whiskey bar" produce the same tokens.

use std::sync::LazyLock;

use regex::Regex;

/// Runs of whitespace, punctuation and symbols separate tokens.
static DELIMITERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\p{P}\p{S}]+").expect("valid regex"));

/// Lowercases `input` and trims surrounding whitespace.
#[must_use]
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Normalizes `input` and splits it into non-empty tokens.
#[must_use]
pub fn split_tokens(input: &str) -> Vec<String> {
    let normalized = normalize(input);
    DELIMITERS_RE
        .split(&normalized)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns `true` if `input` ends with a delimiter, i.e. its last token
/// is complete rather than a prefix still being typed.
#[must_use]
pub fn ends_with_delimiter(input: &str) -> bool {
    input
        .chars()
        .next_back()
        .is_some_and(|c| DELIMITERS_RE.is_match(c.encode_utf8(&mut [0; 4])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace_and_punctuation() {
        assert_eq!(split_tokens("Whiskey-Bar, Inc."), vec![
            "whiskey", "bar", "inc"
        ]);
    }

    #[test]
    fn collapses_repeated_delimiters() {
        assert_eq!(split_tokens("  cafe   MTV  "), vec!["cafe", "mtv"]);
    }

    #[test]
    fn lowercases_non_ascii() {
        assert_eq!(split_tokens("ÜBER Straße"), vec!["über", "straße"]);
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert!(split_tokens("").is_empty());
        assert!(split_tokens(" ,.- ").is_empty());
    }

    #[test]
    fn detects_trailing_delimiter() {
        assert!(ends_with_delimiter("whiskey "));
        assert!(ends_with_delimiter("whiskey,"));
        assert!(!ends_with_delimiter("whiskey"));
        assert!(!ends_with_delimiter(""));
    }
}
