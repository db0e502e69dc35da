//! Glob-style path matching for change triggers.
//!
//! Supported syntax:
//!
//! - `*` matches within one path segment (never `/`)
//! - `?` matches exactly one non-`/` character
//! - `**` matches across segments; `**/` matches zero or more whole segments
//! - a pattern without wildcards matches the path itself and everything below it

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Returns whether a pattern or path contains glob metacharacters.
pub fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// A compiled path pattern.
///
/// Compiling once and matching many times is the expected use: a trigger's
/// patterns are checked against every changed file.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    source: String,
    matcher: Matcher,
}

#[derive(Clone)]
enum Matcher {
    /// Exact path or directory prefix.
    Prefix(String),
    /// Anchored regular expression compiled from a glob.
    Glob(Regex),
}

impl PathPattern {
    /// Compiles a pattern.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let matcher = if has_glob_chars(pattern) {
            Matcher::Glob(Regex::new(&glob_to_regex(pattern))?)
        } else {
            Matcher::Prefix(pattern.trim_end_matches('/').to_string())
        };

        Ok(Self {
            source: pattern.to_string(),
            matcher,
        })
    }

    /// Returns the pattern text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns whether `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match &self.matcher {
            Matcher::Prefix(prefix) => {
                path == self.source
                    || path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Matcher::Glob(regex) => regex.is_match(path),
        }
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PathPattern {}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for PathPattern {
    type Error = regex::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<PathPattern> for String {
    fn from(pattern: PathPattern) -> Self {
        pattern.source
    }
}

/// Returns whether `path` matches `pattern`.
///
/// One-shot form of [`PathPattern::matches`]; compile a [`PathPattern`]
/// instead when the same pattern is checked repeatedly.
pub fn matches(path: &str, pattern: &str) -> bool {
    match PathPattern::new(pattern) {
        Ok(compiled) => compiled.matches(path),
        Err(err) => {
            warn!("Ignoring unusable pattern '{pattern}': {err}");
            false
        }
    }
}

/// Translates a glob into an anchored regular expression.
fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut regex = String::with_capacity(pattern.len() * 2 + 2);
    regex.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    regex.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    regex.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                regex.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                regex.push_str("[^/]");
                i += 1;
            }
            c => {
                let mut buf = [0; 4];
                regex.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                i += 1;
            }
        }
    }

    regex.push('$');
    regex
}
