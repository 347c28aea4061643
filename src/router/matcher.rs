//! Pattern matchers for address and content filters.

use regex::Regex;
use std::sync::Arc;

/// A compiled field pattern.
///
/// Patterns match at the start of the value only: `^` is implied but `$`
/// is not, so `"+25884"` matches `"+258841234567"` while `"841"` does not.
#[derive(Clone)]
pub struct FieldPattern {
    source: String,
    regex: Arc<Regex>,
}

impl std::fmt::Debug for FieldPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldPattern")
            .field("pattern", &self.source)
            .finish()
    }
}

impl PartialEq for FieldPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl FieldPattern {
    /// Compile a pattern.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        // Validate on its own so error positions refer to what the user wrote
        Regex::new(pattern)?;
        let regex = Regex::new(&format!(r"\A(?:{})", pattern))?;

        Ok(Self {
            source: pattern.to_string(),
            regex: Arc::new(regex),
        })
    }

    /// Check if value matches.
    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// Pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Display for FieldPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // FieldPattern Tests
    // ============================================================================

    #[test]
    fn test_prefix_pattern() {
        let m = FieldPattern::new(r"\+258").unwrap();
        assert!(m.matches("+258841234567"));
        assert!(m.matches("+258821234567"));
        assert!(!m.matches("+27841234567")); // South Africa
        assert!(!m.matches("841234567")); // No country code
    }

    #[test]
    fn test_pattern_is_anchored_at_start_only() {
        let m = FieldPattern::new("841").unwrap();
        assert!(m.matches("8412345"));
        assert!(!m.matches("+258841234567"));

        // No implicit end anchor
        let m = FieldPattern::new("hello").unwrap();
        assert!(m.matches("hello world"));
    }

    #[test]
    fn test_alternation_stays_anchored() {
        let m = FieldPattern::new("84|82").unwrap();
        assert!(m.matches("8412"));
        assert!(m.matches("8212"));
        assert!(!m.matches("1282"));
    }

    #[test]
    fn test_operator_pattern() {
        let m = FieldPattern::new(r"\+258(84|82|86|87)\d{7}$").unwrap();
        assert!(m.matches("+258841234567"));
        assert!(m.matches("+258871234567"));
        assert!(!m.matches("+258211234567")); // Landline prefix
        assert!(!m.matches("+2588412345")); // Too short
        assert!(!m.matches("+25884123456789")); // Too long
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(FieldPattern::new("(unclosed").is_err());
        assert!(FieldPattern::new("a)").is_err());
    }

    #[test]
    fn test_pattern_debug() {
        let m = FieldPattern::new(r"\+258").unwrap();
        let debug = format!("{:?}", m);
        assert!(debug.contains("FieldPattern"));
        assert!(debug.contains("258"));
    }
}
