//! Compiled `*` wildcard patterns.
//!
//! Patterns are split once on `*` into literal parts. Matching walks those
//! parts with plain substring search, so a pattern from configuration or a
//! remote robots.txt can never blow up into backtracking.

/// A `*` glob compiled into its literal segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glob {
    pattern: String,
    parts: Vec<String>,
}

impl Glob {
    /// Compile a pattern where `*` matches any (possibly empty) substring
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            parts: pattern.split('*').map(str::to_string).collect(),
        }
    }

    /// The source pattern
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Anchored full-string match, case-sensitive
    pub fn matches(&self, input: &str) -> bool {
        let (first, rest) = match self.parts.split_first() {
            Some(split) => split,
            None => return input.is_empty(),
        };
        let Some((last, middle)) = rest.split_last() else {
            return input == first;
        };

        if input.len() < first.len() + last.len()
            || !input.starts_with(first.as_str())
            || !input.ends_with(last.as_str())
        {
            return false;
        }

        let mut window = &input[first.len()..input.len() - last.len()];
        for part in middle {
            match window.find(part.as_str()) {
                Some(idx) => window = &window[idx + part.len()..],
                None => return false,
            }
        }
        true
    }

    /// Length of the longest match of this pattern anchored at the start of `input`.
    ///
    /// Mirrors a prefix regex where each `*` is a greedy `.*`: a trailing `*`
    /// consumes the rest of the input. Returns `None` when there is no match.
    pub fn prefix_match_len(&self, input: &str) -> Option<usize> {
        let (first, rest) = self.parts.split_first()?;
        if !input.starts_with(first.as_str()) {
            return None;
        }
        let Some((last, middle)) = rest.split_last() else {
            return Some(first.len());
        };

        let mut pos = first.len();
        for part in middle {
            let idx = input[pos..].find(part.as_str())?;
            pos += idx + part.len();
        }

        if last.is_empty() {
            return Some(input.len());
        }
        let idx = input[pos..].rfind(last.as_str())?;
        Some(pos + idx + last.len())
    }
}
