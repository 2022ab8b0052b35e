//! Allow-list input validation
//!
//! Every string that ends up in a command argument list or in an outbound URL
//! passes through [`validate`] first, with the rule matching that call site's
//! character class.

use regex::Regex;
use std::sync::OnceLock;

/// Characters allowed in service and package names
const IDENTIFIER_PATTERN: &str = r"^[\w.\-]+$";

/// Identifier characters plus the `:` needed for ports and IPv6 literals
const SCAN_TARGET_PATTERN: &str = r"^[\w.\-:]+$";

/// Words separated by whitespace
const SEARCH_QUERY_PATTERN: &str = r"^[\w\s]+$";

/// Words, blanks and path punctuation; no line breaks
const SHELL_LINE_PATTERN: &str = r"^[\w \t\-./]+$";

/// Rule construction error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Pattern must be anchored with ^ and $: {0}")]
    Unanchored(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// The character class a rule enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Identifier,
    ScanTarget,
    SearchQuery,
    ShellLine,
}

/// Immutable allow-list rule: a fully anchored pattern plus a length bound
#[derive(Debug, Clone)]
pub struct ValidationRule {
    pattern: Regex,
    max_length: usize,
}

impl ValidationRule {
    /// Build a rule from a pattern that is anchored at both ends
    pub fn new(pattern: &str, max_length: usize) -> Result<Self, ValidationError> {
        if !is_anchored(pattern) {
            return Err(ValidationError::Unanchored(pattern.to_string()));
        }

        // Group the body so alternation cannot escape the outer anchors
        let body = &pattern[1..pattern.len() - 1];
        Ok(Self {
            pattern: Regex::new(&format!("^(?:{})$", body))?,
            max_length,
        })
    }

    /// Shared instance of one of the built-in rules
    pub fn builtin(kind: RuleKind) -> &'static ValidationRule {
        static IDENTIFIER: OnceLock<ValidationRule> = OnceLock::new();
        static SCAN_TARGET: OnceLock<ValidationRule> = OnceLock::new();
        static SEARCH_QUERY: OnceLock<ValidationRule> = OnceLock::new();
        static SHELL_LINE: OnceLock<ValidationRule> = OnceLock::new();

        let (cell, pattern, max_length) = match kind {
            RuleKind::Identifier => (&IDENTIFIER, IDENTIFIER_PATTERN, 100),
            RuleKind::ScanTarget => (&SCAN_TARGET, SCAN_TARGET_PATTERN, 100),
            RuleKind::SearchQuery => (&SEARCH_QUERY, SEARCH_QUERY_PATTERN, 200),
            RuleKind::ShellLine => (&SHELL_LINE, SHELL_LINE_PATTERN, 200),
        };

        cell.get_or_init(|| Self {
            pattern: Regex::new(pattern).expect("built-in validation pattern compiles"),
            max_length,
        })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

fn is_anchored(pattern: &str) -> bool {
    pattern.len() >= 2
        && pattern.starts_with('^')
        && pattern.ends_with('$')
        && !pattern.ends_with(r"\$")
}

/// Returns true iff `text` matches `rule` in full and fits its length bound.
///
/// Length is counted in characters, not bytes.
pub fn validate(text: &str, rule: &ValidationRule) -> bool {
    text.chars().count() <= rule.max_length && rule.pattern.is_match(text)
}

/// Shorthand for [`validate`] against a built-in rule
pub fn validate_as(text: &str, kind: RuleKind) -> bool {
    validate(text, ValidationRule::builtin(kind))
}

/// A string that has passed a built-in rule.
///
/// Command specs only accept user data in this form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInput {
    value: String,
    kind: RuleKind,
}

impl ValidatedInput {
    /// Validate `text` against the built-in rule for `kind`
    pub fn check(text: &str, kind: RuleKind) -> Option<Self> {
        validate_as(text, kind).then(|| Self {
            value: text.to_string(),
            kind,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }
}

impl std::fmt::Display for ValidatedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [RuleKind; 4] = [
        RuleKind::Identifier,
        RuleKind::ScanTarget,
        RuleKind::SearchQuery,
        RuleKind::ShellLine,
    ];

    #[test]
    fn test_service_name_accepts_plain_identifier() {
        assert!(validate_as("nginx", RuleKind::Identifier));
        assert!(validate_as("php8.2-fpm", RuleKind::Identifier));
        assert!(validate_as("systemd_resolved", RuleKind::Identifier));
    }

    #[test]
    fn test_service_name_rejects_injection() {
        assert!(!validate_as("nginx; rm -rf /", RuleKind::Identifier));
        assert!(!validate_as("bogus$", RuleKind::Identifier));
        assert!(!validate_as("nginx ", RuleKind::Identifier));
        assert!(!validate_as("nginx\n", RuleKind::Identifier));
    }

    #[test]
    fn test_empty_input_rejected_by_builtin_rules() {
        for kind in ALL_KINDS {
            assert!(!validate_as("", kind), "{:?} accepted empty input", kind);
        }
    }

    #[test]
    fn test_length_bound_is_inclusive() {
        let at_limit = "a".repeat(100);
        let over_limit = "a".repeat(101);
        assert!(validate_as(&at_limit, RuleKind::Identifier));
        assert!(!validate_as(&over_limit, RuleKind::Identifier));

        let long_query = "word ".repeat(40);
        assert_eq!(long_query.len(), 200);
        assert!(validate_as(&long_query, RuleKind::SearchQuery));
        assert!(!validate_as(&format!("{}x", long_query), RuleKind::SearchQuery));
    }

    #[test]
    fn test_length_counts_characters() {
        // 100 two-byte characters still fit the identifier bound
        let accented = "é".repeat(100);
        assert!(validate_as(&accented, RuleKind::Identifier));
    }

    #[test]
    fn test_scan_target_allows_host_punctuation() {
        assert!(validate_as("10.0.0.1", RuleKind::ScanTarget));
        assert!(validate_as("example.com:8080", RuleKind::ScanTarget));
        assert!(validate_as("fe80::1", RuleKind::ScanTarget));
        assert!(!validate_as("10.0.0.1 -oN /tmp/x", RuleKind::ScanTarget));
        assert!(!validate_as("http://example.com/", RuleKind::ScanTarget));
    }

    #[test]
    fn test_search_query_allows_whitespace() {
        assert!(validate_as("rust async runtime", RuleKind::SearchQuery));
        assert!(!validate_as("rust&lang=en", RuleKind::SearchQuery));
    }

    #[test]
    fn test_shell_line_allows_paths_but_not_newlines() {
        assert!(validate_as("ls -la /var/log", RuleKind::ShellLine));
        assert!(validate_as("cat ./notes.txt", RuleKind::ShellLine));
        assert!(!validate_as("ls\nreboot", RuleKind::ShellLine));
    }

    #[test]
    fn test_shell_metacharacters_fail_every_rule() {
        let metacharacters = [
            ";", "|", "&", "$", "`", "(", ")", "<", ">", "\"", "'", "*", "?", "{", "}", "[",
            "]", "!", "#", "~", "\\",
        ];

        for kind in ALL_KINDS {
            for meta in metacharacters {
                let candidate = format!("safe{}text", meta);
                assert!(
                    !validate_as(&candidate, kind),
                    "{:?} accepted metacharacter {:?}",
                    kind,
                    meta
                );
            }
        }
    }

    #[test]
    fn test_custom_rule_requires_anchors() {
        assert!(matches!(
            ValidationRule::new(r"[a-z]+", 10),
            Err(ValidationError::Unanchored(_))
        ));
        assert!(matches!(
            ValidationRule::new(r"^[a-z]+", 10),
            Err(ValidationError::Unanchored(_))
        ));
        assert!(matches!(
            ValidationRule::new(r"^[a-z]+\$", 10),
            Err(ValidationError::Unanchored(_))
        ));
        assert!(matches!(
            ValidationRule::new(r"^[a-z+$", 10),
            Err(ValidationError::Pattern(_))
        ));
    }

    #[test]
    fn test_alternation_stays_anchored_at_both_ends() {
        let rule = ValidationRule::new(r"^nginx|ssh$", 100).unwrap();
        assert!(validate("nginx", &rule));
        assert!(validate("ssh", &rule));
        assert!(!validate("nginx; rm -rf /", &rule));
        assert!(!validate("rm -rf /; ssh", &rule));
    }

    #[test]
    fn test_custom_rule_matches_whole_string_only() {
        let rule = ValidationRule::new(r"^[a-z]+$", 10).unwrap();
        assert!(validate("abc", &rule));
        assert!(!validate("abc1", &rule));
        assert!(!validate("1abc", &rule));
        assert_eq!(rule.max_length(), 10);
        assert_eq!(rule.pattern(), r"^(?:[a-z]+)$");
    }

    #[test]
    fn test_validated_input_only_wraps_passing_text() {
        let checked = ValidatedInput::check("nginx", RuleKind::Identifier).unwrap();
        assert_eq!(checked.as_str(), "nginx");
        assert_eq!(checked.kind(), RuleKind::Identifier);
        assert_eq!(checked.to_string(), "nginx");

        assert!(ValidatedInput::check("nginx; reboot", RuleKind::Identifier).is_none());
    }

    #[test]
    fn test_custom_rule_may_allow_empty() {
        let rule = ValidationRule::new(r"^[a-z]*$", 10).unwrap();
        assert!(validate("", &rule));
    }
}
