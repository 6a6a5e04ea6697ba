//! Redis-style glob patterns
//!
//! Supports `*`, `?`, `[abc]`, `[^a-z]` / `[!a-z]` and `\` escapes, the same
//! subset `SCAN MATCH` understands, compiled to an anchored regex so local
//! matching agrees with what the remote deletes.

use crate::error::{CacheError, CacheResult};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> CacheResult<Self> {
        let invalid = |reason: &str| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut re = String::with_capacity(pattern.len() * 2 + 8);
        re.push_str("(?s)^");

        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => re.push_str(".*"),
                '?' => re.push('.'),
                '\\' => {
                    let escaped = chars.next().ok_or_else(|| invalid("trailing escape"))?;
                    re.push_str(&regex::escape(&escaped.to_string()));
                }
                '[' => {
                    re.push('[');
                    if matches!(chars.peek(), Some('^') | Some('!')) {
                        chars.next();
                        re.push('^');
                    }
                    let mut closed = false;
                    let mut empty = true;
                    while let Some(c) = chars.next() {
                        match c {
                            ']' if !empty => {
                                closed = true;
                                break;
                            }
                            '\\' => {
                                let escaped =
                                    chars.next().ok_or_else(|| invalid("trailing escape"))?;
                                re.push_str(&regex::escape(&escaped.to_string()));
                            }
                            '-' => re.push('-'),
                            other => re.push_str(&regex::escape(&other.to_string())),
                        }
                        empty = false;
                    }
                    if !closed {
                        return Err(invalid("unterminated character class"));
                    }
                    re.push(']');
                }
                other => re.push_str(&regex::escape(&other.to_string())),
            }
        }
        re.push('$');

        let regex = Regex::new(&re).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Escape glob metacharacters so `literal` only matches itself
pub fn escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        let glob = GlobPattern::new("loan:*").unwrap();
        assert!(glob.matches("loan:1"));
        assert!(glob.matches("loan:"));
        assert!(!glob.matches("payment:loan:1"));

        let glob = GlobPattern::new("loan:?").unwrap();
        assert!(glob.matches("loan:7"));
        assert!(!glob.matches("loan:77"));
    }

    #[test]
    fn test_literal_regex_metacharacters() {
        let glob = GlobPattern::new("profile:a.b+c").unwrap();
        assert!(glob.matches("profile:a.b+c"));
        assert!(!glob.matches("profile:aXbbc"));
    }

    #[test]
    fn test_character_classes() {
        let glob = GlobPattern::new("loan:[12]*").unwrap();
        assert!(glob.matches("loan:10"));
        assert!(glob.matches("loan:2"));
        assert!(!glob.matches("loan:3"));

        let glob = GlobPattern::new("loan:[^1]").unwrap();
        assert!(glob.matches("loan:2"));
        assert!(!glob.matches("loan:1"));

        let glob = GlobPattern::new("x:[a-c]").unwrap();
        assert!(glob.matches("x:b"));
        assert!(!glob.matches("x:d"));
    }

    #[test]
    fn test_escapes_and_errors() {
        let glob = GlobPattern::new(r"token:\*").unwrap();
        assert!(glob.matches("token:*"));
        assert!(!glob.matches("token:abc"));

        assert!(matches!(
            GlobPattern::new("loan:[12"),
            Err(CacheError::InvalidPattern { .. })
        ));
        assert!(GlobPattern::new("loan:\\").is_err());
    }

    #[test]
    fn test_escaped_literal_matches_itself() {
        let glob = GlobPattern::new(&format!("{}:*", escape("odd[ns]*"))).unwrap();
        assert!(glob.matches("odd[ns]*:1"));
        assert!(!glob.matches("oddn:1"));
    }
}
