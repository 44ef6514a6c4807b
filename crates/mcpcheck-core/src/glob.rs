//! Glob-style name matching (`*` and `?`).
//!
//! Resource URI patterns are matched case-sensitively against the whole URI.
//! Suite `filter` and `skip` patterns are name filters: case-insensitive and
//! unanchored, so `weather` selects `getWeather`. Patterns are compiled to
//! regular expressions in which every other character is literal.

use regex::{Regex, RegexBuilder};

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Option<Regex>,
}

impl Glob {
    /// Compile a case-sensitive pattern that must match the whole text.
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        Self::build(pattern, false, true)
    }

    /// Compile a case-insensitive pattern that must match the whole text.
    #[must_use]
    pub fn case_insensitive(pattern: &str) -> Self {
        Self::build(pattern, true, true)
    }

    /// Compile a case-insensitive pattern that may match anywhere in the text.
    #[must_use]
    pub fn name_filter(pattern: &str) -> Self {
        Self::build(pattern, true, false)
    }

    fn build(pattern: &str, case_insensitive: bool, anchored: bool) -> Self {
        let mut source = String::with_capacity(pattern.len() + 8);
        if anchored {
            source.push('^');
        }
        let mut literal = [0u8; 4];
        for c in pattern.chars() {
            match c {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(other.encode_utf8(&mut literal))),
            }
        }
        if anchored {
            source.push('$');
        }

        // Metacharacters are escaped; only the size limit can reject this.
        let regex = RegexBuilder::new(&source)
            .case_insensitive(case_insensitive)
            .dot_matches_new_line(true)
            .build()
            .ok();

        Self {
            pattern: pattern.to_string(),
            regex,
        }
    }

    /// Whether `text` matches the pattern.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(text),
            None => self.pattern == text,
        }
    }
}

/// One-shot case-sensitive match.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    Glob::new(pattern).matches(text)
}
