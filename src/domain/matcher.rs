//! Name and operand patterns used by descriptor parameters.
//!
//! Matching is case-insensitive. `owner*any*` matches anything containing
//! `owner`; any other `*` is dropped and the remainder matches as a substring.

use super::render::normalize;

const ANY: &str = "*any*";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Exact,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    needle: String,
    mode: Mode,
}

impl NamePattern {
    pub fn new(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        let (needle, mode) = if let Some(pos) = lowered.find(ANY) {
            (lowered[..pos].to_string(), Mode::Contains)
        } else if lowered.contains('*') {
            (lowered.replace('*', ""), Mode::Contains)
        } else {
            (lowered, Mode::Exact)
        };
        Self { needle, mode }
    }

    /// Pattern for `callable_function` entries: an argument list after the
    /// callee (`transfer()`, `revert(*any*)`) is ignored.
    pub fn callable(raw: &str) -> Self {
        let trimmed = raw.trim();
        let callee = match trimmed.find('(') {
            Some(pos) if trimmed.ends_with(')') => &trimmed[..pos],
            _ => trimmed,
        };
        Self::new(callee)
    }

    /// Pattern for a `comparison` operand. The text is normalised like a
    /// rendered expression; only `*any*` and a lone `*` act as wildcards so
    /// that multiplication in an operand stays literal.
    pub fn operand(raw: &str) -> Self {
        let normalized = normalize(raw);
        let (needle, mode) = if normalized == "*" {
            (String::new(), Mode::Contains)
        } else if let Some(pos) = normalized.find(ANY) {
            (normalized[..pos].to_string(), Mode::Contains)
        } else {
            (normalized, Mode::Exact)
        };
        Self { needle, mode }
    }

    pub fn is_wildcard(&self) -> bool {
        self.mode == Mode::Contains
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.to_lowercase();
        match self.mode {
            Mode::Exact => candidate == self.needle,
            Mode::Contains => candidate.contains(&self.needle),
        }
    }

    /// Matches an already-normalised operand rendering.
    pub fn matches_normalized(&self, candidate: &str) -> bool {
        match self.mode {
            Mode::Exact => candidate == self.needle,
            Mode::Contains => candidate.contains(&self.needle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_names_ignore_case() {
        let pattern = NamePattern::new("onlyOwner");
        assert!(pattern.matches("ONLYOWNER"));
        assert!(pattern.matches("onlyowner"));
        assert!(!pattern.matches("onlyOwnerOrAdmin"));
    }

    #[test]
    fn test_any_wildcard_keeps_prefix() {
        let pattern = NamePattern::new("only*any*");
        assert!(pattern.matches("onlyOwner"));
        assert!(pattern.matches("notOnlyAdmin"));
        assert!(!pattern.matches("owner"));
    }

    #[test]
    fn test_plain_star_is_substring() {
        let pattern = NamePattern::new("*owner");
        assert!(pattern.is_wildcard());
        assert!(pattern.matches("transferOwnership"));
        assert!(!pattern.matches("admin"));
    }

    #[test]
    fn test_callable_ignores_argument_list() {
        assert!(NamePattern::callable("revert(*any*)").matches("revert"));
        assert!(NamePattern::callable("transfer()").matches("transfer"));
        assert!(!NamePattern::callable("transfer()").matches("transferFrom"));
    }

    #[test]
    fn test_operand_keeps_multiplication_literal() {
        let pattern = NamePattern::operand("a * b");
        assert!(!pattern.is_wildcard());
        assert!(pattern.matches_normalized("a*b"));
        assert!(!pattern.matches_normalized("a+b"));
        assert!(NamePattern::operand("msg.sender").matches_normalized("msg.sender"));
        assert!(NamePattern::operand("*").matches_normalized("anything"));
    }
}
