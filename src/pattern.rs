//! Search/click engine: locates occurrences of a string or regular
//! expression on the raw (unfiltered, untrimmed) per-line text of a grid.
//!
//! Grounded in the "dynamic string-or-regex pattern parameter" design note
//! of spec.md §9: `Pattern` is a sum type at the API boundary, and the CLI's
//! `/.../flags` convention (out of scope here — the CLI is an external
//! collaborator) is mirrored by [`Pattern::from_str_literal_or_slashed`] for
//! the benefit of any front-end built on top of this crate.

use regex::Regex;

/// A search target: either a literal substring or a compiled regular
/// expression.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matched as a literal substring; regex metacharacters are escaped.
    Literal(String),
    /// Matched as a regular expression, applied per line.
    Regex(Regex),
}

impl Pattern {
    /// Build a literal pattern.
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Build a regex pattern from a pattern string and flag letters (only
    /// `i` for case-insensitive is interpreted; an empty flag string is the
    /// common case per spec.md E5).
    ///
    /// # Errors
    /// Returns the underlying `regex` compile error as a `String`.
    pub fn regex(pattern: &str, flags: &str) -> Result<Self, String> {
        let mut builder = regex::RegexBuilder::new(pattern);
        if flags.contains('i') {
            builder.case_insensitive(true);
        }
        builder.build().map(Self::Regex).map_err(|e| e.to_string())
    }

    /// Parse the CLI's `/pattern/flags` convention, falling back to a
    /// literal when `text` isn't wrapped in slashes. This exists for a
    /// front-end built on top of the crate (the CLI itself is out of
    /// scope); `Session::click`/`wait_for_text` accept a [`Pattern`]
    /// directly and do not call this.
    ///
    /// # Errors
    /// Returns the underlying `regex` compile error as a `String` when the
    /// slashed form fails to compile.
    pub fn from_str_literal_or_slashed(text: &str) -> Result<Self, String> {
        if let Some(rest) = text.strip_prefix('/')
            && let Some(last_slash) = rest.rfind('/')
        {
            let body = &rest[..last_slash];
            let flags = &rest[last_slash + 1..];
            return Self::regex(body, flags);
        }
        Ok(Self::literal(text))
    }

    /// Human-readable form used in `AmbiguousClick`/`ClickNotFound` messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Literal(text) => text.clone(),
            Self::Regex(re) => re.as_str().to_string(),
        }
    }

    fn find_in_line(&self, line: &str) -> Vec<(usize, String)> {
        match self {
            Self::Literal(text) => {
                if text.is_empty() {
                    return Vec::new();
                }
                line.match_indices(text.as_str())
                    .map(|(byte_idx, matched)| (char_index(line, byte_idx), matched.to_string()))
                    .collect()
            }
            Self::Regex(re) => re
                .find_iter(line)
                .map(|m| (char_index(line, m.start()), m.as_str().to_string()))
                .collect(),
        }
    }
}

/// Convert a byte offset into `s` to a character (0-based) index, as
/// required by spec.md §4.3's column contract.
fn char_index(s: &str, byte_offset: usize) -> usize {
    s[..byte_offset].chars().count()
}

/// One located match: 0-based row, 0-based character column, and the
/// matched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// 0-based row.
    pub row: usize,
    /// 0-based character column within the raw line text.
    pub col: usize,
    /// The text that matched.
    pub text: String,
}

/// Find every match of `pattern` across `lines`, in line-major then
/// column-major order. Matches never cross line boundaries; a single line
/// may contain multiple matches.
#[must_use]
pub fn find_all(lines: &[String], pattern: &Pattern) -> Vec<Match> {
    let mut matches = Vec::new();
    for (row, line) in lines.iter().enumerate() {
        for (col, text) in pattern.find_in_line(line) {
            matches.push(Match { row, col, text });
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_escapes_metacharacters() {
        let lines = vec!["a.b.c".to_string(), "axbxc".to_string()];
        let pattern = Pattern::literal("a.b");
        let matches = find_all(&lines, &pattern);
        assert_eq!(matches, vec![Match { row: 0, col: 0, text: "a.b".into() }]);
    }

    #[test]
    fn regex_pattern_matches_multiple_per_line() {
        let lines = vec!["aaa bbb aaa".to_string()];
        let pattern = Pattern::regex("aaa", "").unwrap();
        let matches = find_all(&lines, &pattern);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].col, 0);
        assert_eq!(matches[1].col, 8);
    }

    #[test]
    fn matches_do_not_cross_line_boundaries() {
        let lines = vec!["foo".to_string(), "bar".to_string()];
        let pattern = Pattern::regex("foo\\nbar", "").unwrap();
        assert!(find_all(&lines, &pattern).is_empty());
    }

    #[test]
    fn column_is_char_index_not_byte_index() {
        let lines = vec!["héllo world".to_string()];
        let pattern = Pattern::literal("world");
        let matches = find_all(&lines, &pattern);
        assert_eq!(matches[0].col, 6);
    }

    #[test]
    fn slashed_syntax_parses_as_regex() {
        let pattern = Pattern::from_str_literal_or_slashed("/value: \\d+/").unwrap();
        assert!(matches!(pattern, Pattern::Regex(_)));
        let lines = vec!["echo \"value: 42\"".to_string(), "value: 42".to_string()];
        let matches = find_all(&lines, &pattern);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn bare_text_parses_as_literal() {
        let pattern = Pattern::from_str_literal_or_slashed("hello").unwrap();
        assert!(matches!(pattern, Pattern::Literal(_)));
    }
}
