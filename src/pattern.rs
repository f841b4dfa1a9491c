//! What an `expect` call waits for, and what it returns once it matched.
//!
//! Matching is scoped to a single [`Chunk`](crate::Chunk). Output is delivered
//! in whatever pieces the OS read returned, so a prompt that arrives split over
//! two reads is never matched by either piece. Callers that depend on long
//! patterns should expect a short, distinctive fragment instead.

use regex::Regex;
use std::fmt;

/// A literal substring or a compiled regular expression.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    /// Compile `re` into a regex pattern.
    pub fn regex(re: &str) -> Result<Self, regex::Error> {
        Ok(Pattern::Regex(Regex::new(re)?))
    }

    /// Test one chunk of output. `None` means keep waiting.
    pub fn find(&self, text: &str) -> Option<Match> {
        match self {
            Pattern::Literal(needle) => text.contains(needle.as_str()).then(|| Match {
                text: text.to_string(),
                captures: Vec::new(),
            }),
            Pattern::Regex(re) => {
                let captures = captures_all(re, text);
                (!captures.is_empty()).then(|| Match {
                    text: text.to_string(),
                    captures,
                })
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(text) => f.write_str(text),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for Pattern {
    fn from(text: &str) -> Self {
        Pattern::Literal(text.to_string())
    }
}

impl From<String> for Pattern {
    fn from(text: String) -> Self {
        Pattern::Literal(text)
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re)
    }
}

/// A successful expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Full text of the chunk that matched.
    pub text: String,
    /// Regex matches in left-to-right order; each holds the whole match
    /// followed by one entry per capture group. Empty for literal patterns.
    pub captures: Vec<Vec<String>>,
}

/// All non-overlapping matches of `re` in `text`.
///
/// Groups that did not take part in a match show up as empty strings, so every
/// inner vector has `captures_len()` entries.
pub(crate) fn captures_all(re: &Regex, text: &str) -> Vec<Vec<String>> {
    re.captures_iter(text)
        .map(|caps| {
            caps.iter()
                .map(|group| group.map_or_else(String::new, |m| m.as_str().to_string()))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_returns_whole_chunk() {
        let m = Pattern::literal("Hello,").find("Hello, Fred.\r\n").unwrap();
        assert_eq!(m.text, "Hello, Fred.\r\n");
        assert!(m.captures.is_empty());
    }

    #[test]
    fn test_literal_is_case_sensitive() {
        assert!(Pattern::literal("hello").find("Hello, Fred.").is_none());
    }

    #[test]
    fn test_regex_groups() {
        let m = Pattern::regex(r"(.)(.)(.) are you\?")
            .unwrap()
            .find("Who are you?\r\n")
            .unwrap();
        assert_eq!(m.captures, vec![vec!["Who are you?", "W", "h", "o"]]);
    }

    #[test]
    fn test_regex_all_matches_in_order() {
        let m = Pattern::regex(r"(\w+)=(\d+)")
            .unwrap()
            .find("a=1 b=22 c=x d=4")
            .unwrap();
        assert_eq!(
            m.captures,
            vec![
                vec!["a=1", "a", "1"],
                vec!["b=22", "b", "22"],
                vec!["d=4", "d", "4"],
            ]
        );
    }

    #[test]
    fn test_regex_unmatched_group_is_empty() {
        let m = Pattern::regex(r"(x)?(y)").unwrap().find("y").unwrap();
        assert_eq!(m.captures, vec![vec!["y", "", "y"]]);
    }

    #[test]
    fn test_regex_no_match() {
        assert!(Pattern::regex(r"\d+").unwrap().find("no digits").is_none());
    }

    #[test]
    fn test_split_pattern_does_not_match_either_half() {
        let pattern = Pattern::literal("Password:");
        assert!(pattern.find("Pass").is_none());
        assert!(pattern.find("word:").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(Pattern::literal("$ ").to_string(), "$ ");
        assert_eq!(Pattern::regex(r"\d+").unwrap().to_string(), r"/\d+/");
    }

    #[test]
    fn test_invalid_regex() {
        assert!(Pattern::regex("(unclosed").is_err());
    }
}
